use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::error::InstallResult;

const APP_USER_AGENT: &str = concat!("mcinstall/", env!("CARGO_PKG_VERSION"));

/// Shared client for every fetch the engine performs.
///
/// Content hashes are computed over the bytes on the wire, so transfer
/// encodings are disabled.
pub fn build_http_client() -> InstallResult<Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let client = Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(Duration::from_secs(15))
        .build()?;
    Ok(client)
}
