use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::context::OverlayContext;
use super::installer::OverlayInstaller;
use crate::core::config::InstallOptions;
use crate::core::downloader::Downloader;
use crate::core::error::{InstallError, InstallResult};
use crate::core::install::{install_dependencies, InstallOutcome};
use crate::core::location::MinecraftFolder;
use crate::core::maven::{MavenArtifact, LITELOADER_RELEASES, LITELOADER_SNAPSHOTS};
use crate::core::verify::verify;
use crate::core::version::{Arguments, LibraryEntry, ResolvedVersion, VersionJson};

pub const LAUNCH_WRAPPER_MAIN: &str = "net.minecraft.launchwrapper.Launch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteLoaderLibrary {
    pub name: String,
}

/// One entry of the LiteLoader versions index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteLoaderVersionMeta {
    /// Repository base the jar is published under.
    #[serde(default)]
    pub url: String,
    /// `SNAPSHOT` or `RELEASE`.
    #[serde(rename = "type")]
    pub release_type: String,
    pub file: String,
    pub version: String,
    /// Published MD5 of `file`.
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub timestamp: String,
    pub mcversion: String,
    pub tweak_class: String,
    #[serde(default)]
    pub libraries: Vec<LiteLoaderLibrary>,
}

impl LiteLoaderVersionMeta {
    pub fn is_snapshot(&self) -> bool {
        self.release_type.eq_ignore_ascii_case("SNAPSHOT")
    }

    pub fn coordinate(&self) -> String {
        format!("com.mumfrey:liteloader:{}", self.version)
    }
}

/// LiteLoader layered over vanilla or over another overlay such as Forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteLoaderOverlay {
    pub meta: LiteLoaderVersionMeta,
    /// Installed version to inherit from; defaults to `meta.mcversion`.
    pub base_version: Option<String>,
}

impl LiteLoaderOverlay {
    pub fn new(meta: LiteLoaderVersionMeta) -> Self {
        Self {
            meta,
            base_version: None,
        }
    }

    pub fn on_base(meta: LiteLoaderVersionMeta, base_version: impl Into<String>) -> Self {
        Self {
            meta,
            base_version: Some(base_version.into()),
        }
    }

    pub fn base_id(&self) -> &str {
        self.base_version
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.meta.mcversion)
    }

    pub fn version_id(&self) -> String {
        format!(
            "{}-Liteloader{}-{}",
            self.base_id(),
            self.meta.mcversion,
            self.meta.version
        )
    }

    fn repository(&self) -> String {
        match (self.meta.is_snapshot(), self.meta.url.trim()) {
            (true, "") => format!("{}/", LITELOADER_SNAPSHOTS),
            (true, url) => url.to_string(),
            (false, _) => format!("{}/", LITELOADER_RELEASES),
        }
    }

    fn loader_library(&self) -> LibraryEntry {
        let mut library = LibraryEntry::named(self.meta.coordinate());
        library.url = Some(self.repository());
        // Only an MD5 is published; the verifier tells digests apart by length.
        if !self.meta.md5.trim().is_empty() {
            library.checksums = Some(vec![self.meta.md5.trim().to_string()]);
        }
        library
    }

    fn release_time(&self) -> Option<String> {
        let seconds = self.meta.timestamp.trim().parse::<i64>().ok()?;
        chrono::DateTime::from_timestamp(seconds, 0).map(|t| t.to_rfc3339())
    }

    /// The overlay manifest for a resolved base.
    fn derive_manifest(&self, base: &ResolvedVersion) -> VersionJson {
        let mut libraries = vec![self.loader_library()];
        for lib in &self.meta.libraries {
            if !libraries.iter().any(|l| l.name == lib.name) {
                libraries.push(LibraryEntry::named(lib.name.clone()));
            }
        }

        let tweak = self.meta.tweak_class.as_str();
        let (minecraft_arguments, arguments) = match &base.manifest.minecraft_arguments {
            Some(legacy) => (Some(format!("--tweakClass {} {}", tweak, legacy)), None),
            None => (
                None,
                Some(Arguments {
                    game: vec!["--tweakClass".into(), tweak.into()],
                    jvm: Vec::new(),
                }),
            ),
        };

        let version_type = if self.meta.is_snapshot() {
            "snapshot"
        } else {
            "release"
        };
        let release_time = self.release_time();
        VersionJson {
            id: self.version_id(),
            version_type: Some(version_type.to_string()),
            time: release_time.clone(),
            release_time,
            main_class: Some(LAUNCH_WRAPPER_MAIN.into()),
            inherits_from: Some(self.base_id().to_string()),
            jar: Some(base.jar_version.clone()),
            libraries,
            minecraft_arguments,
            arguments,
            ..VersionJson::default()
        }
    }

    /// Install the overlay and its libraries, then check the LiteLoader jar
    /// against the published MD5.
    pub async fn install_and_check(
        &self,
        location: &MinecraftFolder,
        options: &InstallOptions,
    ) -> InstallResult<InstallOutcome> {
        let downloader = Downloader::from_options(options)?;
        let id = self
            .install(OverlayContext::new(location, options, &downloader))
            .await?;
        let version = ResolvedVersion::parse(location, &id).await?;
        let outcome = install_dependencies(&version, location, options).await?;

        let jar = location.library(&MavenArtifact::parse(&self.meta.coordinate())?.repository_path());
        let md5 = self.meta.md5.trim();
        let check = verify(&jar, (!md5.is_empty()).then_some(md5), None).await?;
        if !check.is_valid() {
            return Err(InstallError::VerificationFailure {
                path: jar,
                reason: check.describe(),
            });
        }
        debug!("LiteLoader jar {:?} matches its published digest", jar);
        Ok(outcome)
    }
}

#[async_trait]
impl OverlayInstaller for LiteLoaderOverlay {
    async fn install(&self, ctx: OverlayContext<'_>) -> InstallResult<String> {
        info!(
            "Installing LiteLoader {} on {}",
            self.meta.version,
            self.base_id()
        );
        let base = ResolvedVersion::parse(ctx.location, self.base_id()).await?;
        let manifest = self.derive_manifest(&base);
        manifest.write(ctx.location).await?;
        info!("LiteLoader registered as {}", manifest.id);
        Ok(manifest.id)
    }
}
