pub mod manifest;
pub mod rules;
pub mod version_file;

pub use manifest::{
    fetch_remote_manifest_index, FetchIndexOptions, LatestVersions, VersionList, VersionMeta,
};
pub use rules::{rules_allow, OsFamily, OsRule, Platform, Rule, RuleAction};
pub use version_file::{
    merge_versions, Arguments, AssetIndexInfo, DownloadArtifact, LibraryDownloads, LibraryEntry,
    ResolvedVersion, VersionDownloads, VersionJson,
};
