// ─── Version Index ───
// Fetches the Mojang version manifest v2 (the list of every known version),
// reusing a previously fetched copy when the server reports no change.

use chrono::DateTime;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::{InstallOptions, VERSION_MANIFEST_URL};
use crate::core::error::{InstallError, InstallResult};

/// Top-level version index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionList {
    #[serde(default)]
    pub latest: LatestVersions,
    pub versions: Vec<VersionMeta>,
    /// `Last-Modified` of the response this list came from.
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestVersions {
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub snapshot: String,
}

/// A single entry in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "releaseTime", default)]
    pub release_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchIndexOptions {
    /// Index location; the Mojang endpoint when unset.
    pub url: Option<String>,
    /// Previously fetched index, returned as-is when nothing changed.
    pub fallback: Option<VersionList>,
}

impl FetchIndexOptions {
    /// Point at the index configured in `options.repositories`.
    pub fn from_options(options: &InstallOptions) -> Self {
        Self {
            url: Some(options.repositories.version_manifest.clone()),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: VersionList) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl VersionList {
    /// Find a specific version entry by ID (e.g. "1.12.2").
    pub fn find(&self, id: &str) -> Option<&VersionMeta> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn releases(&self) -> Vec<&VersionMeta> {
        self.versions
            .iter()
            .filter(|v| v.version_type == "release")
            .collect()
    }
}

fn same_instant(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    match (DateTime::parse_from_rfc2822(a), DateTime::parse_from_rfc2822(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Fetch the version index. With a fallback, the request is conditional on
/// the fallback's timestamp and an unchanged index returns the fallback.
pub async fn fetch_remote_manifest_index(
    client: &reqwest::Client,
    options: FetchIndexOptions,
) -> InstallResult<VersionList> {
    let FetchIndexOptions { url, fallback } = options;
    let url = url.as_deref().unwrap_or(VERSION_MANIFEST_URL);

    let mut request = client.get(url);
    if let Some(previous) = fallback.as_ref().filter(|f| !f.timestamp.is_empty()) {
        request = request.header(IF_MODIFIED_SINCE, previous.timestamp.as_str());
    }

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_MODIFIED {
        if let Some(previous) = fallback {
            debug!("Version index not modified since {}", previous.timestamp);
            return Ok(previous);
        }
    }
    if !status.is_success() {
        return Err(InstallError::NetworkFailure {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    let timestamp = response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if let Some(previous) = fallback {
        if same_instant(&timestamp, &previous.timestamp) {
            debug!("Version index unchanged ({})", timestamp);
            return Ok(previous);
        }
    }

    let mut list: VersionList = response.json().await?;
    list.timestamp = timestamp;
    info!("Loaded {} versions from index", list.versions.len());
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODIFIED: &str = "Thu, 15 Feb 2018 16:26:45 GMT";

    fn index_body() -> serde_json::Value {
        serde_json::json!({
            "latest": {"release": "1.12.2", "snapshot": "17w43b"},
            "versions": [
                {"id": "17w43b", "type": "snapshot", "url": "https://x/17w43b.json",
                 "time": "2018-01-15T11:09:31+00:00", "releaseTime": "2017-10-26T13:36:22+00:00"},
                {"id": "1.12.2", "type": "release", "url": "https://x/1.12.2.json",
                 "time": "2018-02-15T16:26:45+00:00", "releaseTime": "2017-09-18T08:39:46+00:00",
                 "sha1": "cf72a57ff499d6d9ade870b2143ee54958bd33ef"}
            ]
        })
    }

    #[test]
    fn deserialize_index_entry() {
        let list: VersionList = serde_json::from_value(index_body()).unwrap();
        let entry = list.find("1.12.2").unwrap();
        assert_eq!(entry.version_type, "release");
        assert_eq!(entry.release_time, "2017-09-18T08:39:46+00:00");
        assert_eq!(list.releases().len(), 1);
        assert!(list.timestamp.is_empty());
    }

    #[tokio::test]
    async fn fetch_records_last_modified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version_manifest_v2.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", MODIFIED)
                    .set_body_json(index_body()),
            )
            .mount(&server)
            .await;

        let list = fetch_remote_manifest_index(
            &reqwest::Client::new(),
            FetchIndexOptions {
                url: Some(format!("{}/version_manifest_v2.json", server.uri())),
                fallback: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(list.timestamp, MODIFIED);
        assert_eq!(list.latest.release, "1.12.2");
    }

    #[tokio::test]
    async fn unchanged_index_returns_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version_manifest_v2.json"))
            .and(header_exists("If-Modified-Since"))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let mut fallback: VersionList = serde_json::from_value(index_body()).unwrap();
        fallback.timestamp = MODIFIED.to_string();

        let list = fetch_remote_manifest_index(
            &reqwest::Client::new(),
            FetchIndexOptions {
                url: Some(format!("{}/version_manifest_v2.json", server.uri())),
                fallback: Some(fallback.clone()),
            },
        )
        .await
        .unwrap();
        assert_eq!(list, fallback);
        assert_eq!(list.timestamp, fallback.timestamp);
    }

    #[tokio::test]
    async fn same_last_modified_returns_fallback_even_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", MODIFIED)
                    .set_body_json(serde_json::json!({"versions": []})),
            )
            .mount(&server)
            .await;

        let mut fallback: VersionList = serde_json::from_value(index_body()).unwrap();
        fallback.timestamp = MODIFIED.to_string();

        let list = fetch_remote_manifest_index(
            &reqwest::Client::new(),
            FetchIndexOptions {
                url: Some(server.uri()),
                fallback: Some(fallback.clone()),
            },
        )
        .await
        .unwrap();
        assert_eq!(list, fallback);
    }

    #[tokio::test]
    async fn configured_mirror_is_used_for_the_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mirror/version_manifest_v2.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(index_body()))
            .expect(1)
            .mount(&server)
            .await;

        let options = InstallOptions::default().with_repositories(crate::core::config::Repositories {
            version_manifest: format!("{}/mirror/version_manifest_v2.json", server.uri()),
            ..Default::default()
        });
        let list = fetch_remote_manifest_index(
            &reqwest::Client::new(),
            FetchIndexOptions::from_options(&options),
        )
        .await
        .unwrap();
        assert!(list.find("17w43b").is_some());
        server.verify().await;
    }

    #[tokio::test]
    async fn server_error_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = fetch_remote_manifest_index(
            &reqwest::Client::new(),
            FetchIndexOptions {
                url: Some(server.uri()),
                fallback: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InstallError::NetworkFailure { .. }));
    }
}
