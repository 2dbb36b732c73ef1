// ─── Install Options ───
// Caller-facing knobs for install and overlay calls, optionally loaded from a
// JSON settings file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::version::Platform;

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";
pub const FABRIC_META_URL: &str = "https://meta.fabricmc.net";

/// Remote endpoints, overridable for mirrors and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Repositories {
    pub version_manifest: String,
    pub libraries: String,
    pub resources: String,
    pub forge_maven: String,
    pub fabric_meta: String,
}

impl Default for Repositories {
    fn default() -> Self {
        Self {
            version_manifest: VERSION_MANIFEST_URL.to_string(),
            libraries: crate::core::maven::MOJANG_LIBRARIES.to_string(),
            resources: RESOURCES_URL.to_string(),
            forge_maven: crate::core::maven::FORGE_MAVEN.to_string(),
            fabric_meta: FABRIC_META_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallOptions {
    /// Verify hashes of existing files; `false` trusts existence alone.
    pub checksum: bool,
    /// Scratch space for loader installers.
    pub temp_dir: PathBuf,
    pub clear_temp_dir_after_install: bool,
    /// Width of the download pool.
    pub concurrency: usize,
    /// Extra attempts per artifact after the first failure.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub java_path: Option<PathBuf>,
    /// Overrides the detected platform for rule evaluation.
    pub platform: Option<Platform>,
    pub repositories: Repositories,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            checksum: true,
            temp_dir: std::env::temp_dir().join("mcinstall"),
            clear_temp_dir_after_install: true,
            concurrency: 8,
            max_retries: 3,
            retry_base_delay_ms: 250,
            java_path: None,
            platform: None,
            repositories: Repositories::default(),
        }
    }
}

impl InstallOptions {
    /// Read options from a JSON file. Missing keys take their defaults; a
    /// missing or malformed file yields the defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(options) => options,
            Err(e) => {
                warn!("Ignoring malformed install settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_clear_temp_dir(mut self, clear: bool) -> Self {
        self.clear_temp_dir_after_install = clear;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_repositories(mut self, repositories: Repositories) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn with_java_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.java_path = Some(path.into());
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install.json");
        std::fs::write(&path, r#"{"checksum": false, "concurrency": 2}"#).unwrap();

        let options = InstallOptions::load(&path);
        assert!(!options.checksum);
        assert_eq!(options.concurrency, 2);
        assert_eq!(options.max_retries, 3);
        assert!(options.clear_temp_dir_after_install);
        assert_eq!(options.repositories, Repositories::default());
    }

    #[test]
    fn malformed_settings_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install.json");
        std::fs::write(&path, "{not json").unwrap();

        let options = InstallOptions::load(&path);
        assert!(options.checksum);
        assert_eq!(options.concurrency, 8);
    }
}
