// ─── Version File ───
// Typed Mojang version JSON, the inheritance merge, and the on-disk
// read/write of `versions/<id>/<id>.json`.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::rules::{rules_allow, Platform, Rule};
use crate::core::downloader::write_atomic;
use crate::core::error::{InstallError, InstallResult};
use crate::core::location::MinecraftFolder;
use crate::core::maven::MavenArtifact;

/// Loader overlays stack at most a few levels deep; anything longer is a loop.
const MAX_INHERITANCE_DEPTH: usize = 8;

/// A Mojang-format version JSON. Fields the engine does not interpret are
/// kept in `extra` so written manifests lose nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    /// Version whose jar this one runs, when not its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<DownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<DownloadArtifact>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Remote file with its published digest. Loader-generated libraries carry an
/// empty `url`: they exist only once the loader's installer produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

/// Modern argument templates. Entries are plain strings or rule-guarded
/// objects; launching interprets them, installing only carries them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Value>,
    #[serde(default)]
    pub jvm: Vec<Value>,
}

// ─── Library Entry ───

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    /// OS name → native classifier (may contain `${arch}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,
    /// Repository base for libraries resolved by coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Legacy Forge digests; the first one is the jar's SHA-1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksums: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<DownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<BTreeMap<String, DownloadArtifact>>,
}

impl LibraryEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Version-independent identity used when an overlay replaces a library.
    pub fn key(&self) -> String {
        MavenArtifact::parse(&self.name)
            .map(|a| a.key())
            .unwrap_or_else(|_| self.name.clone())
    }

    pub fn is_allowed(&self, platform: &Platform) -> InstallResult<bool> {
        rules_allow(self.rules.as_deref(), platform)
    }

    /// Native classifier for `platform`, with `${arch}` substituted.
    pub fn native_classifier(&self, platform: &Platform) -> Option<String> {
        let natives = self.natives.as_ref()?;
        natives
            .get(platform.name.as_str())
            .map(|c| c.replace("${arch}", platform.arch_bits()))
    }
}

// ─── Merge ───

/// Effective manifest of `child` stacked on `parent`.
///
/// Scalars from the child win. Argument lists concatenate parent then child.
/// Libraries concatenate parent then child, and a parent library is dropped
/// when the child declares the same library (same key, any version).
pub fn merge_versions(parent: &VersionJson, child: &VersionJson) -> VersionJson {
    let mut extra = parent.extra.clone();
    for (key, value) in &child.extra {
        extra.insert(key.clone(), value.clone());
    }

    VersionJson {
        id: child.id.clone(),
        version_type: child.version_type.clone().or_else(|| parent.version_type.clone()),
        time: child.time.clone().or_else(|| parent.time.clone()),
        release_time: child.release_time.clone().or_else(|| parent.release_time.clone()),
        main_class: child.main_class.clone().or_else(|| parent.main_class.clone()),
        inherits_from: None,
        jar: child.jar.clone().or_else(|| parent.jar.clone()),
        libraries: merge_libraries(&parent.libraries, &child.libraries),
        downloads: child.downloads.clone().or_else(|| parent.downloads.clone()),
        asset_index: child.asset_index.clone().or_else(|| parent.asset_index.clone()),
        assets: child.assets.clone().or_else(|| parent.assets.clone()),
        arguments: merge_arguments(parent.arguments.as_ref(), child.arguments.as_ref()),
        minecraft_arguments: child
            .minecraft_arguments
            .clone()
            .or_else(|| parent.minecraft_arguments.clone()),
        extra,
    }
}

fn merge_libraries(parent: &[LibraryEntry], child: &[LibraryEntry]) -> Vec<LibraryEntry> {
    // Duplicates inside one manifest are platform variants and stay.
    let overridden: HashSet<String> = child.iter().map(LibraryEntry::key).collect();
    parent
        .iter()
        .filter(|lib| !overridden.contains(&lib.key()))
        .chain(child.iter())
        .cloned()
        .collect()
}

fn merge_arguments(parent: Option<&Arguments>, child: Option<&Arguments>) -> Option<Arguments> {
    match (parent, child) {
        (None, None) => None,
        (Some(p), None) => Some(p.clone()),
        (None, Some(c)) => Some(c.clone()),
        (Some(p), Some(c)) => Some(Arguments {
            game: p.game.iter().chain(&c.game).cloned().collect(),
            jvm: p.jvm.iter().chain(&c.jvm).cloned().collect(),
        }),
    }
}

// ─── Disk I/O ───

impl VersionJson {
    pub fn from_slice(bytes: &[u8]) -> InstallResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read `versions/<id>/<id>.json`. An absent or unreadable file is
    /// `ManifestNotFound`; a readable file that is not a manifest is a JSON error.
    pub async fn read(location: &MinecraftFolder, id: &str) -> InstallResult<Self> {
        let path = location.version_json(id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Cannot read version json {:?}: {}", path, e);
                return Err(InstallError::ManifestNotFound {
                    id: id.to_string(),
                    path,
                });
            }
        };

        let mut json = Self::from_slice(&raw)?;
        if json.id.is_empty() {
            json.id = id.to_string();
        }
        Ok(json)
    }

    /// Register this manifest under `versions/<id>/<id>.json`.
    pub async fn write(&self, location: &MinecraftFolder) -> InstallResult<PathBuf> {
        let path = location.version_json(&self.id);
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(&path, &bytes).await?;
        Ok(path)
    }
}

/// A version with its whole `inheritsFrom` chain merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVersion {
    pub id: String,
    /// This version first, its root ancestor last.
    pub inheritances: Vec<String>,
    pub manifest: VersionJson,
    /// Version whose jar is run.
    pub jar_version: String,
}

impl ResolvedVersion {
    /// Read `id` and every ancestor from disk and merge them.
    pub async fn parse(location: &MinecraftFolder, id: &str) -> InstallResult<Self> {
        let mut ids = vec![id.to_string()];
        let mut chain = vec![VersionJson::read(location, id).await?];

        while let Some(parent) = chain
            .last()
            .and_then(|v| v.inherits_from.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
        {
            if ids.contains(&parent) || ids.len() >= MAX_INHERITANCE_DEPTH {
                return Err(InstallError::Other(format!(
                    "Inheritance chain of {} does not terminate at {}",
                    id, parent
                )));
            }
            chain.push(VersionJson::read(location, &parent).await?);
            ids.push(parent);
        }

        let mut resolved = Self::from_chain(chain)?;
        resolved.inheritances = ids;
        Ok(resolved)
    }

    /// Merge an already-loaded chain (this version first, root last).
    pub fn from_chain(chain: Vec<VersionJson>) -> InstallResult<Self> {
        let mut iter = chain.into_iter().rev();
        let root = iter
            .next()
            .ok_or_else(|| InstallError::Other("Empty version chain".into()))?;

        let mut inheritances = vec![root.id.clone()];
        let root_id = root.id.clone();
        let mut merged = root;
        for child in iter {
            inheritances.insert(0, child.id.clone());
            merged = merge_versions(&merged, &child);
        }

        let jar_version = merged.jar.clone().unwrap_or(root_id);
        Ok(Self {
            id: merged.id.clone(),
            inheritances,
            manifest: merged,
            jar_version,
        })
    }

    pub fn libraries(&self) -> &[LibraryEntry] {
        &self.manifest.libraries
    }

    pub fn asset_index_id(&self) -> Option<&str> {
        self.manifest
            .asset_index
            .as_ref()
            .map(|a| a.id.as_str())
            .or(self.manifest.assets.as_deref())
    }
}
