// ─── Minecraft Folder ───
// On-disk layout of an installation. Every path the engine reads or writes
// is derived here from an identifier, coordinate path or content hash.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Which distribution is being installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallSide {
    #[default]
    Client,
    Server,
}

impl fmt::Display for InstallSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallSide::Client => write!(f, "client"),
            InstallSide::Server => write!(f, "server"),
        }
    }
}

/// Paths relative to the installation root.
pub mod layout {
    use std::path::PathBuf;

    use super::InstallSide;

    pub fn version_dir(id: &str) -> PathBuf {
        PathBuf::from("versions").join(id)
    }

    pub fn version_json(id: &str) -> PathBuf {
        version_dir(id).join(format!("{}.json", id))
    }

    pub fn version_jar(id: &str, side: InstallSide) -> PathBuf {
        match side {
            InstallSide::Client => version_dir(id).join(format!("{}.jar", id)),
            InstallSide::Server => version_dir(id).join(format!("{}-server.jar", id)),
        }
    }

    /// `path` is a Maven repository path such as `org/ow2/asm/asm/5.2/asm-5.2.jar`.
    pub fn library(path: &str) -> PathBuf {
        let mut out = PathBuf::from("libraries");
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            out.push(segment);
        }
        out
    }

    pub fn asset_index(id: &str) -> PathBuf {
        PathBuf::from("assets")
            .join("indexes")
            .join(format!("{}.json", id))
    }

    pub fn asset_object(hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        PathBuf::from("assets")
            .join("objects")
            .join(prefix)
            .join(hash)
    }
}

/// Root of a `.minecraft`-style directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MinecraftFolder {
    root: PathBuf,
}

impl MinecraftFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The launcher's standard location for the current platform.
    pub fn default_location() -> Self {
        let root = if cfg!(target_os = "windows") {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".minecraft")
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("minecraft")
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".minecraft")
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a layout-relative path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.root.join(layout::version_dir(id))
    }

    pub fn version_json(&self, id: &str) -> PathBuf {
        self.root.join(layout::version_json(id))
    }

    pub fn version_jar(&self, id: &str, side: InstallSide) -> PathBuf {
        self.root.join(layout::version_jar(id, side))
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn library(&self, path: &str) -> PathBuf {
        self.root.join(layout::library(path))
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index(&self, id: &str) -> PathBuf {
        self.root.join(layout::asset_index(id))
    }

    pub fn asset_object(&self, hash: &str) -> PathBuf {
        self.root.join(layout::asset_object(hash))
    }
}

impl From<PathBuf> for MinecraftFolder {
    fn from(root: PathBuf) -> Self {
        Self::new(root)
    }
}

impl From<&Path> for MinecraftFolder {
    fn from(root: &Path) -> Self {
        Self::new(root)
    }
}

impl AsRef<Path> for MinecraftFolder {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_paths_follow_launcher_layout() {
        let folder = MinecraftFolder::new("/games/mc");
        assert_eq!(
            folder.version_json("1.12.2"),
            PathBuf::from("/games/mc/versions/1.12.2/1.12.2.json")
        );
        assert_eq!(
            folder.version_jar("1.12.2", InstallSide::Client),
            PathBuf::from("/games/mc/versions/1.12.2/1.12.2.jar")
        );
        assert_eq!(
            folder.version_jar("1.12.2", InstallSide::Server),
            PathBuf::from("/games/mc/versions/1.12.2/1.12.2-server.jar")
        );
    }

    #[test]
    fn asset_objects_are_content_addressed() {
        let folder = MinecraftFolder::new("/mc");
        assert_eq!(
            folder.asset_object("bdf48ef6b5d0d23bbb02e17d04865216179f510a"),
            PathBuf::from("/mc/assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a")
        );
        assert_eq!(
            folder.asset_index("1.12"),
            PathBuf::from("/mc/assets/indexes/1.12.json")
        );
    }

    #[test]
    fn library_paths_split_maven_segments() {
        assert_eq!(
            layout::library("org/ow2/asm/asm-all/5.2/asm-all-5.2.jar"),
            PathBuf::from("libraries/org/ow2/asm/asm-all/5.2/asm-all-5.2.jar")
        );
    }
}
