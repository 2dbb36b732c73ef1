use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{InstallError, InstallResult};
use crate::core::location::{layout, MinecraftFolder};

/// Top-level asset index JSON structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssetIndex {
    /// Virtual path → object.
    pub objects: BTreeMap<String, AssetObject>,
    #[serde(default, rename = "virtual", skip_serializing_if = "Option::is_none")]
    pub is_virtual: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_to_resources: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// `assets/objects/<hh>/<hash>`, relative to the installation root.
    pub fn relative_path(&self) -> PathBuf {
        layout::asset_object(&self.hash)
    }

    pub fn url(&self, resources_base: &str) -> String {
        format!(
            "{}/{}/{}",
            resources_base.trim_end_matches('/'),
            self.hash.get(..2).unwrap_or(&self.hash),
            self.hash
        )
    }
}

impl AssetIndex {
    pub fn from_slice(bytes: &[u8]) -> InstallResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read `assets/indexes/<id>.json`; `None` when it is not there.
    pub async fn read(location: &MinecraftFolder, id: &str) -> InstallResult<Option<Self>> {
        let path = location.asset_index(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Self::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Asset index {} not present at {:?}", id, path);
                Ok(None)
            }
            Err(e) => Err(InstallError::io(path, e)),
        }
    }

    pub fn total_size(&self) -> u64 {
        self.objects.values().map(|o| o.size).sum()
    }
}
