// ─── Artifact Resolver ───
// Expands a resolved version into the concrete files it needs: version json
// and jar, platform-filtered libraries and natives, the asset index and every
// asset object. Pure data; nothing here touches the disk or the network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::assets::AssetIndex;
use crate::core::config::{InstallOptions, Repositories};
use crate::core::error::{InstallError, InstallResult};
use crate::core::location::{layout, InstallSide, MinecraftFolder};
use crate::core::maven::MavenArtifact;
use crate::core::version::{DownloadArtifact, LibraryEntry, Platform, ResolvedVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    VersionJson,
    VersionJar,
    Library,
    Native,
    AssetIndex,
    Asset,
}

/// One required file: where it comes from, where it goes, what it must hash to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub kind: ArtifactKind,
    /// Coordinate, version id or asset virtual path.
    pub name: String,
    /// `None` for files the engine produces itself or that only a loader
    /// installer can generate.
    pub url: Option<String>,
    /// Relative to the installation root.
    pub path: PathBuf,
    pub hash: Option<String>,
    pub size: Option<u64>,
}

impl ArtifactDescriptor {
    pub fn absolute(&self, location: &MinecraftFolder) -> PathBuf {
        location.resolve(&self.path)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Deduplicated artifact closure of one version.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSet {
    pub version_id: String,
    pub version_json: ArtifactDescriptor,
    pub version_jar: ArtifactDescriptor,
    pub asset_index: Option<ArtifactDescriptor>,
    pub libraries: Vec<ArtifactDescriptor>,
    pub assets: Vec<ArtifactDescriptor>,
    #[serde(skip)]
    registry: HashMap<PathBuf, Slot>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Fixed,
    Library(usize),
    Asset(usize),
}

impl ArtifactSet {
    fn new(
        version_id: String,
        version_json: ArtifactDescriptor,
        version_jar: ArtifactDescriptor,
    ) -> InstallResult<Self> {
        let mut set = Self {
            version_id,
            version_json,
            version_jar,
            asset_index: None,
            libraries: Vec::new(),
            assets: Vec::new(),
            registry: HashMap::new(),
        };
        let json = set.version_json.clone();
        let jar = set.version_jar.clone();
        set.insert(json)?;
        set.insert(jar)?;
        Ok(set)
    }

    /// Add `artifact` unless its path is already taken. A second claim on a
    /// path must agree on the digest; it may fill in a missing one.
    pub fn insert(&mut self, artifact: ArtifactDescriptor) -> InstallResult<bool> {
        if let Some(slot) = self.registry.get(&artifact.path).copied() {
            let (existing_name, existing_hash) = self
                .slot(slot, &artifact.path)
                .map(|e| (e.name.clone(), e.hash.clone()))
                .unwrap_or_default();

            if let (Some(a), Some(b)) = (&existing_hash, &artifact.hash) {
                if !a.eq_ignore_ascii_case(b) {
                    return Err(InstallError::ArtifactConflict {
                        path: artifact.path,
                        first: existing_name,
                        first_hash: a.clone(),
                        second: artifact.name,
                        second_hash: b.clone(),
                    });
                }
            }

            let existing = match slot {
                Slot::Fixed => None,
                Slot::Library(i) => self.libraries.get_mut(i),
                Slot::Asset(i) => self.assets.get_mut(i),
            };
            if let Some(existing) = existing {
                if existing.hash.is_none() {
                    existing.hash = artifact.hash;
                }
                if existing.size.is_none() {
                    existing.size = artifact.size;
                }
                if existing.url.is_none() {
                    existing.url = artifact.url;
                }
            }
            return Ok(false);
        }

        let slot = match artifact.kind {
            ArtifactKind::Library | ArtifactKind::Native => {
                self.libraries.push(artifact.clone());
                Slot::Library(self.libraries.len() - 1)
            }
            ArtifactKind::Asset => {
                self.assets.push(artifact.clone());
                Slot::Asset(self.assets.len() - 1)
            }
            ArtifactKind::VersionJson | ArtifactKind::VersionJar | ArtifactKind::AssetIndex => {
                Slot::Fixed
            }
        };
        self.registry.insert(artifact.path, slot);
        Ok(true)
    }

    fn slot(&self, slot: Slot, path: &Path) -> Option<&ArtifactDescriptor> {
        match slot {
            Slot::Library(i) => self.libraries.get(i),
            Slot::Asset(i) => self.assets.get(i),
            Slot::Fixed => [
                Some(&self.version_json),
                Some(&self.version_jar),
                self.asset_index.as_ref(),
            ]
            .into_iter()
            .flatten()
            .find(|a| a.path == path),
        }
    }

    fn set_asset_index(&mut self, index: ArtifactDescriptor) -> InstallResult<()> {
        self.asset_index = Some(index.clone());
        self.insert(index)?;
        Ok(())
    }

    /// Every artifact, in phase order.
    pub fn iter(&self) -> impl Iterator<Item = &ArtifactDescriptor> {
        [&self.version_json, &self.version_jar]
            .into_iter()
            .chain(self.libraries.iter())
            .chain(self.asset_index.iter())
            .chain(self.assets.iter())
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

/// Turns manifests into [`ArtifactSet`]s for one side and platform.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    side: InstallSide,
    platform: Platform,
    repositories: Repositories,
}

impl ArtifactResolver {
    pub fn new(side: InstallSide, platform: Platform) -> Self {
        Self {
            side,
            platform,
            repositories: Repositories::default(),
        }
    }

    pub fn from_options(side: InstallSide, options: &InstallOptions) -> Self {
        Self::new(side, options.platform()).with_repositories(options.repositories.clone())
    }

    pub fn with_repositories(mut self, repositories: Repositories) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn side(&self) -> InstallSide {
        self.side
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Expand `version`. Assets are only enumerated for the client and only
    /// when the index has been loaded.
    pub fn resolve(
        &self,
        version: &ResolvedVersion,
        asset_index: Option<&AssetIndex>,
    ) -> InstallResult<ArtifactSet> {
        let manifest = &version.manifest;

        let version_json = ArtifactDescriptor {
            kind: ArtifactKind::VersionJson,
            name: version.id.clone(),
            url: None,
            path: layout::version_json(&version.id),
            hash: None,
            size: None,
        };

        let jar_download = manifest.downloads.as_ref().and_then(|d| match self.side {
            InstallSide::Client => d.client.as_ref(),
            InstallSide::Server => d.server.as_ref(),
        });
        let version_jar = ArtifactDescriptor {
            kind: ArtifactKind::VersionJar,
            name: format!("{} {} jar", version.jar_version, self.side),
            url: jar_download.and_then(|d| non_empty(Some(d.url.as_str()))),
            path: layout::version_jar(&version.jar_version, self.side),
            hash: jar_download.and_then(|d| non_empty(d.sha1.as_deref())),
            size: jar_download.and_then(|d| d.size),
        };

        let mut set = ArtifactSet::new(version.id.clone(), version_json, version_jar)?;

        for library in &manifest.libraries {
            for artifact in self.resolve_library(library)? {
                set.insert(artifact)?;
            }
        }

        if self.side == InstallSide::Client {
            if let Some(info) = &manifest.asset_index {
                set.set_asset_index(ArtifactDescriptor {
                    kind: ArtifactKind::AssetIndex,
                    name: info.id.clone(),
                    url: non_empty(Some(info.url.as_str())),
                    path: layout::asset_index(&info.id),
                    hash: non_empty(info.sha1.as_deref()),
                    size: info.size,
                })?;
            }
            if let Some(index) = asset_index {
                self.add_assets(&mut set, index)?;
            }
        }

        Ok(set)
    }

    /// Enumerate every object of `index` into `set`.
    pub fn add_assets(&self, set: &mut ArtifactSet, index: &AssetIndex) -> InstallResult<()> {
        if self.side == InstallSide::Server {
            return Ok(());
        }
        for (name, object) in &index.objects {
            set.insert(ArtifactDescriptor {
                kind: ArtifactKind::Asset,
                name: name.clone(),
                url: Some(object.url(&self.repositories.resources)),
                path: object.relative_path(),
                hash: non_empty(Some(object.hash.as_str())),
                size: Some(object.size),
            })?;
        }
        Ok(())
    }

    /// Files contributed by one library entry on this platform.
    pub fn resolve_library(&self, library: &LibraryEntry) -> InstallResult<Vec<ArtifactDescriptor>> {
        if !library.is_allowed(&self.platform)? {
            return Ok(Vec::new());
        }

        let classifier = match self.side {
            InstallSide::Client => library.native_classifier(&self.platform),
            InstallSide::Server => None,
        };
        let mut out = Vec::new();

        match &library.downloads {
            Some(downloads) => {
                if let Some(artifact) = &downloads.artifact {
                    out.push(self.from_download(ArtifactKind::Library, library, None, artifact)?);
                }
                if let Some(classifier) = &classifier {
                    match downloads.classifiers.as_ref().and_then(|c| c.get(classifier)) {
                        Some(native) => out.push(self.from_download(
                            ArtifactKind::Native,
                            library,
                            Some(classifier),
                            native,
                        )?),
                        None => out.push(self.from_coordinate(
                            ArtifactKind::Native,
                            library,
                            Some(classifier),
                        )?),
                    }
                }
            }
            None => match (&library.natives, &classifier) {
                (Some(_), Some(classifier)) => out.push(self.from_coordinate(
                    ArtifactKind::Native,
                    library,
                    Some(classifier),
                )?),
                // Natives-only library with nothing for this OS.
                (Some(_), None) => {}
                (None, _) => out.push(self.from_coordinate(ArtifactKind::Library, library, None)?),
            },
        }

        Ok(out)
    }

    fn from_download(
        &self,
        kind: ArtifactKind,
        library: &LibraryEntry,
        classifier: Option<&str>,
        download: &DownloadArtifact,
    ) -> InstallResult<ArtifactDescriptor> {
        let (name, repository_path) = match non_empty(download.path.as_deref()) {
            Some(path) => (named(&library.name, classifier), path),
            None => {
                let coordinate = coordinate(library, classifier)?;
                (coordinate.to_string(), coordinate.repository_path())
            }
        };
        Ok(ArtifactDescriptor {
            kind,
            name,
            url: non_empty(Some(download.url.as_str())),
            path: layout::library(&repository_path),
            hash: non_empty(download.sha1.as_deref()),
            size: download.size,
        })
    }

    fn from_coordinate(
        &self,
        kind: ArtifactKind,
        library: &LibraryEntry,
        classifier: Option<&str>,
    ) -> InstallResult<ArtifactDescriptor> {
        let coordinate = coordinate(library, classifier)?;
        let repository = non_empty(library.url.as_deref())
            .unwrap_or_else(|| self.repositories.libraries.clone());
        // Legacy checksums describe the main jar only.
        let hash = match kind {
            ArtifactKind::Library => library
                .checksums
                .as_ref()
                .and_then(|c| non_empty(c.first().map(String::as_str))),
            _ => None,
        };
        Ok(ArtifactDescriptor {
            kind,
            name: coordinate.to_string(),
            url: Some(coordinate.url(&repository)),
            path: layout::library(&coordinate.repository_path()),
            hash,
            size: None,
        })
    }
}

fn coordinate(library: &LibraryEntry, classifier: Option<&str>) -> InstallResult<MavenArtifact> {
    let coordinate = MavenArtifact::parse(&library.name)?;
    Ok(match classifier {
        Some(c) => coordinate.with_classifier(c),
        None => coordinate,
    })
}

fn named(name: &str, classifier: Option<&str>) -> String {
    match classifier {
        Some(c) => format!("{}:{}", name, c),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::AssetObject;
    use crate::core::version::{OsFamily, VersionJson};
    use serde_json::json;

    fn linux() -> Platform {
        Platform::new(OsFamily::Linux, "6.1", "x64")
    }

    fn windows() -> Platform {
        Platform::new(OsFamily::Windows, "10.0", "x86")
    }

    fn version(value: serde_json::Value) -> ResolvedVersion {
        let json: VersionJson = serde_json::from_value(value).unwrap();
        ResolvedVersion::from_chain(vec![json]).unwrap()
    }

    fn vanilla() -> ResolvedVersion {
        version(json!({
            "id": "1.12.2",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "downloads": {
                "client": {"url": "https://launcher.mojang.com/client.jar", "sha1": "0f275bc1547d01fa5f56ba34bdc87d981ee12daf", "size": 10180113},
                "server": {"url": "https://launcher.mojang.com/server.jar", "sha1": "886945bfb2b978778c3a0288fd7fab09d315b25f", "size": 30222121}
            },
            "assetIndex": {"id": "1.12", "url": "https://x/1.12.json", "sha1": "1584b57c1a0b5e593fad1f5b8f78536ca640547b", "size": 143138, "totalSize": 129336389},
            "libraries": [
                {"name": "com.mojang:patchy:1.1",
                 "downloads": {"artifact": {"path": "com/mojang/patchy/1.1/patchy-1.1.jar",
                   "url": "https://libraries.minecraft.net/com/mojang/patchy/1.1/patchy-1.1.jar",
                   "sha1": "aef610b34a1be37fa851825f12372b78424d8903", "size": 15817}}},
                {"name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4-nightly-20150209",
                 "natives": {"linux": "natives-linux", "windows": "natives-windows-${arch}"},
                 "downloads": {"classifiers": {
                    "natives-linux": {"path": "org/lwjgl/lwjgl/lwjgl-platform/2.9.4-nightly-20150209/lwjgl-platform-2.9.4-nightly-20150209-natives-linux.jar",
                      "url": "https://libraries.minecraft.net/natives-linux.jar", "sha1": "931074f46c795d2f7b30ed6395df5715cfd7675b", "size": 578680}
                 }}},
                {"name": "ca.weblite:java-objc-bridge:1.0.0",
                 "rules": [{"action": "allow", "os": {"name": "osx"}}],
                 "downloads": {"artifact": {"path": "ca/weblite/java-objc-bridge/1.0.0/java-objc-bridge-1.0.0.jar",
                   "url": "https://x/objc.jar", "sha1": "6ef160c3133a78de015830860197602ca1c855d3", "size": 40502}}}
            ]
        }))
    }

    #[test]
    fn client_closure_filters_by_platform() {
        let set = ArtifactResolver::new(InstallSide::Client, linux())
            .resolve(&vanilla(), None)
            .unwrap();

        let names: Vec<_> = set.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "com.mojang:patchy:1.1",
                "org.lwjgl.lwjgl:lwjgl-platform:2.9.4-nightly-20150209:natives-linux"
            ]
        );
        assert_eq!(set.libraries[1].kind, ArtifactKind::Native);
        assert_eq!(set.version_jar.path, PathBuf::from("versions/1.12.2/1.12.2.jar"));
        assert_eq!(
            set.version_jar.hash.as_deref(),
            Some("0f275bc1547d01fa5f56ba34bdc87d981ee12daf")
        );
        assert_eq!(
            set.asset_index.as_ref().unwrap().path,
            PathBuf::from("assets/indexes/1.12.json")
        );
        assert!(set.version_json.url.is_none());
    }

    #[test]
    fn missing_classifier_download_falls_back_to_coordinate() {
        let set = ArtifactResolver::new(InstallSide::Client, windows())
            .resolve(&vanilla(), None)
            .unwrap();
        let native = set
            .libraries
            .iter()
            .find(|l| l.kind == ArtifactKind::Native)
            .unwrap();
        assert_eq!(
            native.url.as_deref(),
            Some("https://libraries.minecraft.net/org/lwjgl/lwjgl/lwjgl-platform/2.9.4-nightly-20150209/lwjgl-platform-2.9.4-nightly-20150209-natives-windows-32.jar")
        );
    }

    #[test]
    fn server_side_uses_server_jar_and_skips_assets() {
        let mut index = AssetIndex::default();
        index.objects.insert(
            "icons/icon_16x16.png".into(),
            AssetObject {
                hash: "bdf48ef6b5d0d23bbb02e17d04865216179f510a".into(),
                size: 3665,
            },
        );
        let set = ArtifactResolver::new(InstallSide::Server, linux())
            .resolve(&vanilla(), Some(&index))
            .unwrap();
        assert_eq!(
            set.version_jar.path,
            PathBuf::from("versions/1.12.2/1.12.2-server.jar")
        );
        assert!(set.asset_index.is_none());
        assert!(set.assets.is_empty());
        assert!(set.libraries.iter().all(|l| l.kind == ArtifactKind::Library));
    }

    #[test]
    fn assets_sharing_a_hash_collapse_to_one_object() {
        let mut index = AssetIndex::default();
        for name in ["a.ogg", "b.ogg"] {
            index.objects.insert(
                name.into(),
                AssetObject {
                    hash: "bdf48ef6b5d0d23bbb02e17d04865216179f510a".into(),
                    size: 3665,
                },
            );
        }
        let set = ArtifactResolver::new(InstallSide::Client, linux())
            .resolve(&vanilla(), Some(&index))
            .unwrap();
        assert_eq!(set.assets.len(), 1);
        assert_eq!(
            set.assets[0].url.as_deref(),
            Some("https://resources.download.minecraft.net/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a")
        );
    }

    #[test]
    fn same_path_with_different_hashes_is_a_conflict() {
        let conflicting = version(json!({
            "id": "broken",
            "libraries": [
                {"name": "a:b:1", "downloads": {"artifact": {"path": "a/b/1/b-1.jar", "url": "https://x/1", "sha1": "aaaa"}}},
                {"name": "a:b-copy:1", "downloads": {"artifact": {"path": "a/b/1/b-1.jar", "url": "https://x/2", "sha1": "bbbb"}}}
            ]
        }));
        let err = ArtifactResolver::new(InstallSide::Client, linux())
            .resolve(&conflicting, None)
            .unwrap_err();
        match err {
            InstallError::ArtifactConflict { first, second, .. } => {
                assert_eq!(first, "a:b:1");
                assert_eq!(second, "a:b-copy:1");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_path_fills_missing_digest() {
        let duplicated = version(json!({
            "id": "dup",
            "libraries": [
                {"name": "a:b:1", "url": "https://maven.example/"},
                {"name": "a:b:1", "downloads": {"artifact": {"path": "a/b/1/b-1.jar", "url": "https://x/b.jar", "sha1": "cccc", "size": 3}}}
            ]
        }));
        let set = ArtifactResolver::new(InstallSide::Client, linux())
            .resolve(&duplicated, None)
            .unwrap();
        assert_eq!(set.libraries.len(), 1);
        assert_eq!(set.libraries[0].url.as_deref(), Some("https://maven.example/a/b/1/b-1.jar"));
        assert_eq!(set.libraries[0].hash.as_deref(), Some("cccc"));
        assert_eq!(set.libraries[0].size, Some(3));
    }

    #[test]
    fn coordinate_library_uses_checksums_and_repository() {
        let library: LibraryEntry = serde_json::from_value(json!({
            "name": "net.minecraftforge:forge:1.12.2-14.23.5.2823",
            "url": "https://maven.minecraftforge.net/",
            "checksums": ["e3b0c44298fc1c149afbf4c8996fb92427ae41e4", ""]
        }))
        .unwrap();
        let resolved = ArtifactResolver::new(InstallSide::Client, linux())
            .resolve_library(&library)
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved[0].path,
            PathBuf::from("libraries/net/minecraftforge/forge/1.12.2-14.23.5.2823/forge-1.12.2-14.23.5.2823.jar")
        );
        assert_eq!(
            resolved[0].hash.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4")
        );
    }

    #[test]
    fn loader_generated_library_has_no_url() {
        let library: LibraryEntry = serde_json::from_value(json!({
            "name": "net.minecraftforge:forge:1.14.4-28.2.0:client",
            "downloads": {"artifact": {"path": "net/minecraftforge/forge/1.14.4-28.2.0/forge-1.14.4-28.2.0-client.jar", "url": "", "sha1": "dddd", "size": 10}}
        }))
        .unwrap();
        let resolved = ArtifactResolver::new(InstallSide::Client, linux())
            .resolve_library(&library)
            .unwrap();
        assert!(resolved[0].url.is_none());
    }
}
