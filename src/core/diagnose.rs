// ─── Diagnostic Engine ───
// Read-only comparison of an installation against the artifact closure of
// one of its versions. Missing files are reported, never repaired.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::assets::{AssetIndex, AssetObject};
use crate::core::error::{InstallError, InstallResult};
use crate::core::location::{InstallSide, MinecraftFolder};
use crate::core::resolver::{ArtifactDescriptor, ArtifactResolver};
use crate::core::version::{Platform, ResolvedVersion};

/// Concurrent `stat` calls while checking libraries and assets.
const CHECK_CONCURRENCY: usize = 64;

/// Snapshot of everything a version still lacks on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisReport {
    pub version_id: String,
    pub missing_version_json: bool,
    pub missing_version_jar: bool,
    pub missing_asset_index: bool,
    pub missing_libraries: Vec<ArtifactDescriptor>,
    /// Virtual asset path → expected object.
    pub missing_assets: BTreeMap<String, AssetObject>,
}

impl DiagnosisReport {
    /// Nothing is missing.
    pub fn is_empty(&self) -> bool {
        !self.missing_version_json
            && !self.missing_version_jar
            && !self.missing_asset_index
            && self.missing_libraries.is_empty()
            && self.missing_assets.is_empty()
    }
}

/// Diagnose the client side of `version_id` for the running platform.
pub async fn diagnose(version_id: &str, location: &MinecraftFolder) -> InstallResult<DiagnosisReport> {
    diagnose_side(version_id, location, InstallSide::Client, &Platform::current()).await
}

pub async fn diagnose_side(
    version_id: &str,
    location: &MinecraftFolder,
    side: InstallSide,
    platform: &Platform,
) -> InstallResult<DiagnosisReport> {
    let mut report = DiagnosisReport {
        version_id: version_id.to_string(),
        ..Default::default()
    };

    let version = match ResolvedVersion::parse(location, version_id).await {
        Ok(version) => version,
        Err(InstallError::ManifestNotFound { id, path }) => {
            debug!("Diagnose {}: manifest {} missing at {:?}", version_id, id, path);
            report.missing_version_json = true;
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    let resolver = ArtifactResolver::new(side, platform.clone());
    let artifacts = resolver.resolve(&version, None)?;

    report.missing_version_jar = !non_empty_file(&artifacts.version_jar.absolute(location)).await;

    let libraries: Vec<_> = stream::iter(artifacts.libraries.iter())
        .map(|library| async move {
            let present = is_file(&library.absolute(location)).await;
            (library, present)
        })
        .buffer_unordered(CHECK_CONCURRENCY)
        .filter_map(|(library, present)| async move { (!present).then(|| library.clone()) })
        .collect()
        .await;
    report.missing_libraries = libraries;
    // Stable order regardless of completion order.
    report.missing_libraries.sort_by(|a, b| a.path.cmp(&b.path));

    if let Some(index_artifact) = &artifacts.asset_index {
        match AssetIndex::read(location, &index_artifact.name).await {
            Ok(Some(index)) => {
                report.missing_assets = missing_assets(&index, location).await;
            }
            Ok(None) => report.missing_asset_index = true,
            Err(e) => {
                debug!("Asset index {} unreadable: {}", index_artifact.name, e);
                report.missing_asset_index = true;
            }
        }
    }

    info!(
        "Diagnosed {}: jar missing={}, {} libraries missing, {} assets missing",
        version_id,
        report.missing_version_jar,
        report.missing_libraries.len(),
        report.missing_assets.len()
    );
    Ok(report)
}

async fn missing_assets(index: &AssetIndex, location: &MinecraftFolder) -> BTreeMap<String, AssetObject> {
    stream::iter(index.objects.iter())
        .map(|(name, object)| async move {
            let path: PathBuf = location.resolve(&object.relative_path());
            (name, object, is_file(&path).await)
        })
        .buffer_unordered(CHECK_CONCURRENCY)
        .filter_map(|(name, object, present)| async move {
            (!present).then(|| (name.clone(), object.clone()))
        })
        .collect()
        .await
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::OsFamily;
    use serde_json::json;

    fn linux() -> Platform {
        Platform::new(OsFamily::Linux, "6.1", "x64")
    }

    fn put(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn seed_version(root: &Path) {
        let manifest = json!({
            "id": "1.12.2",
            "downloads": {"client": {"url": "https://x/client.jar", "sha1": "aaaa", "size": 4}},
            "assetIndex": {"id": "1.12", "url": "https://x/1.12.json"},
            "libraries": [
                {"name": "com.mojang:patchy:1.1",
                 "downloads": {"artifact": {"path": "com/mojang/patchy/1.1/patchy-1.1.jar", "url": "https://x/patchy.jar"}}},
                {"name": "org.lwjgl.lwjgl:lwjgl:2.9.4"}
            ]
        });
        put(root, "versions/1.12.2/1.12.2.json", manifest.to_string().as_bytes());
    }

    fn seed_index(root: &Path) {
        let index = json!({"objects": {
            "icons/icon_16x16.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 4},
            "sounds/a.ogg": {"hash": "0123456789abcdef0123456789abcdef01234567", "size": 4}
        }});
        put(root, "assets/indexes/1.12.json", index.to_string().as_bytes());
    }

    #[tokio::test]
    async fn missing_manifest_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let report = diagnose_side("1.12.2", &MinecraftFolder::new(dir.path()), InstallSide::Client, &linux())
            .await
            .unwrap();
        assert!(report.missing_version_json);
        assert!(!report.missing_version_jar);
        assert!(report.missing_libraries.is_empty());
        assert!(!report.is_empty());
    }

    #[tokio::test]
    async fn reports_every_missing_piece() {
        let dir = tempfile::tempdir().unwrap();
        seed_version(dir.path());
        seed_index(dir.path());
        put(dir.path(), "versions/1.12.2/1.12.2.jar", b"");
        put(dir.path(), "libraries/com/mojang/patchy/1.1/patchy-1.1.jar", b"jar!");
        put(dir.path(), "assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a", b"png!");

        let report = diagnose_side("1.12.2", &MinecraftFolder::new(dir.path()), InstallSide::Client, &linux())
            .await
            .unwrap();

        // A zero-length jar counts as missing.
        assert!(report.missing_version_jar);
        assert!(!report.missing_asset_index);
        let names: Vec<_> = report.missing_libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["org.lwjgl.lwjgl:lwjgl:2.9.4"]);
        assert_eq!(
            report.missing_assets.keys().collect::<Vec<_>>(),
            vec!["sounds/a.ogg"]
        );
    }

    #[tokio::test]
    async fn missing_index_skips_asset_checks() {
        let dir = tempfile::tempdir().unwrap();
        seed_version(dir.path());
        let report = diagnose_side("1.12.2", &MinecraftFolder::new(dir.path()), InstallSide::Client, &linux())
            .await
            .unwrap();
        assert!(report.missing_asset_index);
        assert!(report.missing_assets.is_empty());
    }

    #[tokio::test]
    async fn complete_installation_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        seed_version(dir.path());
        seed_index(dir.path());
        put(dir.path(), "versions/1.12.2/1.12.2.jar", b"jar!");
        put(dir.path(), "libraries/com/mojang/patchy/1.1/patchy-1.1.jar", b"jar!");
        put(dir.path(), "libraries/org/lwjgl/lwjgl/lwjgl/2.9.4/lwjgl-2.9.4.jar", b"jar!");
        put(dir.path(), "assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a", b"png!");
        put(dir.path(), "assets/objects/01/0123456789abcdef0123456789abcdef01234567", b"ogg!");

        let report = diagnose_side("1.12.2", &MinecraftFolder::new(dir.path()), InstallSide::Client, &linux())
            .await
            .unwrap();
        assert!(report.is_empty(), "{report:?}");

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["missingVersionJar"], json!(false));
    }

    #[tokio::test]
    async fn malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        put(dir.path(), "versions/bad/bad.json", b"{not json");
        let err = diagnose_side("bad", &MinecraftFolder::new(dir.path()), InstallSide::Client, &linux())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Json(_)));
    }
}
