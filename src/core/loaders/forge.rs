use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::OverlayContext;
use super::installer::OverlayInstaller;
use crate::core::downloader::{write_atomic, DownloadEntry};
use crate::core::error::{InstallError, InstallResult};
use crate::core::java::resolve_java_binary;
use crate::core::location::{InstallSide, MinecraftFolder};
use crate::core::maven::MavenArtifact;
use crate::core::verify::{digests_match, expected_digest, ContentHasher, HashAlgorithm};
use crate::core::version::VersionJson;

const LOADER: &str = "Forge";

/// One published Forge file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeArtifactMeta {
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub sha1: String,
    /// Path on the Forge maven, e.g.
    /// `/maven/net/minecraftforge/forge/1.12.2-14.23.5.2823/forge-1.12.2-14.23.5.2823-installer.jar`.
    pub path: String,
}

/// Forge release as listed by the Forge download index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeVersionMeta {
    pub mcversion: String,
    pub version: String,
    pub universal: ForgeArtifactMeta,
    pub installer: ForgeArtifactMeta,
}

/// Subset of a pre-1.13 `install_profile.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstallProfile {
    install: LegacyInstall,
    version_info: VersionJson,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstall {
    /// Coordinate of the universal jar.
    path: String,
    /// Name of the universal jar inside the installer.
    file_path: String,
}

/// Installs Forge from its official installer jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeOverlay {
    pub meta: ForgeVersionMeta,
}

impl ForgeOverlay {
    pub fn new(meta: ForgeVersionMeta) -> Self {
        Self { meta }
    }

    pub fn version_id(&self) -> String {
        format!(
            "{}-forge{}-{}",
            self.meta.mcversion, self.meta.mcversion, self.meta.version
        )
    }

    /// Index paths carry the legacy `/maven` mount point of the old files host.
    fn artifact_url(repository: &str, path: &str) -> String {
        let path = path
            .strip_prefix("/maven/")
            .unwrap_or(path)
            .trim_start_matches('/');
        format!("{}/{}", repository.trim_end_matches('/'), path)
    }

    fn failure(message: impl Into<String>) -> InstallError {
        InstallError::LoaderInstallerFailure {
            loader: LOADER.into(),
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Stamp our id onto a manifest produced by the installer.
    fn reidentify(&self, mut manifest: VersionJson) -> VersionJson {
        manifest.id = self.version_id();
        if manifest.inherits_from.is_none() {
            manifest.inherits_from = Some(self.meta.mcversion.clone());
        }
        manifest
    }

    async fn fetch_installer(&self, ctx: &OverlayContext<'_>, temp: &Path) -> InstallResult<PathBuf> {
        let file_name = self
            .meta
            .installer
            .path
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("forge-{}-installer.jar", self.version_id()));
        let entry = DownloadEntry {
            url: Self::artifact_url(&ctx.options.repositories.forge_maven, &self.meta.installer.path),
            dest: temp.join(file_name),
            hash: expected_digest(Some(self.meta.installer.sha1.as_str())).map(str::to_string),
            size: None,
        };
        ctx.downloader
            .download_with_retry(&entry, &CancellationToken::new())
            .await?;
        Ok(entry.dest)
    }

    // ── Legacy (≤ 1.12.2) ───────────────────────────────

    async fn install_legacy(
        &self,
        ctx: &OverlayContext<'_>,
        installer: &[u8],
        profile: LegacyInstallProfile,
    ) -> InstallResult<String> {
        let coordinate = MavenArtifact::parse(&profile.install.path)?;
        let universal = read_entry(installer, &profile.install.file_path)?.ok_or_else(|| {
            Self::failure(format!(
                "installer has no {} entry",
                profile.install.file_path
            ))
        })?;

        if let Some(expected) = expected_digest(Some(self.meta.universal.sha1.as_str())) {
            let mut hasher = ContentHasher::new(HashAlgorithm::for_digest(expected));
            hasher.update(&universal);
            let actual = hasher.finalize_hex();
            if !digests_match(expected, &actual) {
                return Err(InstallError::VerificationFailure {
                    path: PathBuf::from(&profile.install.file_path),
                    reason: format!("universal jar hash {} != {}", actual, expected),
                });
            }
        }

        let dest = ctx.location.library(&coordinate.repository_path());
        write_atomic(&dest, &universal).await?;
        debug!("Extracted Forge universal jar to {:?}", dest);

        let manifest = self.reidentify(profile.version_info);
        manifest.write(ctx.location).await?;
        Ok(manifest.id)
    }

    // ── Modern (≥ 1.13) ─────────────────────────────────

    async fn install_modern(
        &self,
        ctx: &OverlayContext<'_>,
        installer_path: &Path,
        temp: &Path,
        generated: VersionJson,
    ) -> InstallResult<String> {
        let mc = &self.meta.mcversion;
        let staging = MinecraftFolder::new(temp);

        // The installer patches the base jar in place, so it needs both files.
        let base_json = ctx.location.version_json(mc);
        if !base_json.is_file() {
            return Err(InstallError::ManifestNotFound {
                id: mc.clone(),
                path: base_json,
            });
        }
        let base_jar = ctx.location.version_jar(mc, InstallSide::Client);
        if !base_jar.is_file() {
            return Err(Self::failure(format!(
                "base jar {:?} must be installed first",
                base_jar
            )));
        }
        copy_file(&base_json, &staging.version_json(mc)).await?;
        copy_file(&base_jar, &staging.version_jar(mc, InstallSide::Client)).await?;

        let launcher_profiles = temp.join("launcher_profiles.json");
        if !launcher_profiles.exists() {
            tokio::fs::write(&launcher_profiles, br#"{"profiles":{},"selectedProfile":null}"#)
                .await
                .map_err(|e| InstallError::io(&launcher_profiles, e))?;
        }

        let java = resolve_java_binary(ctx.options.java_path.as_deref());
        info!("Running Forge installer with {:?}", java);
        let output = tokio::process::Command::new(&java)
            .arg("-jar")
            .arg(installer_path)
            .arg("--installClient")
            .arg(temp)
            .current_dir(temp)
            .output()
            .await
            .map_err(|e| Self::failure(format!("cannot run {:?}: {}", java, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(InstallError::LoaderInstallerFailure {
                loader: LOADER.into(),
                message: format!("installer exited with {:?}", output.status.code()),
                stdout,
                stderr,
            });
        }

        let produced = staging.version_json(&generated.id);
        let raw = match tokio::fs::read(&produced).await {
            Ok(raw) => raw,
            Err(_) => {
                return Err(InstallError::LoaderInstallerFailure {
                    loader: LOADER.into(),
                    message: format!("installer produced no manifest at {:?}", produced),
                    stdout,
                    stderr,
                })
            }
        };

        let copied = copy_tree(&staging.libraries_dir(), &ctx.location.libraries_dir()).await?;
        debug!("Copied {} installer-produced libraries", copied);

        let manifest = self.reidentify(VersionJson::from_slice(&raw)?);
        manifest.write(ctx.location).await?;
        Ok(manifest.id)
    }
}

#[async_trait::async_trait]
impl OverlayInstaller for ForgeOverlay {
    async fn install(&self, ctx: OverlayContext<'_>) -> InstallResult<String> {
        let id = self.version_id();
        info!(
            "Installing Forge {} for MC {}",
            self.meta.version, self.meta.mcversion
        );

        let temp = ctx.options.temp_dir.join(&id);
        tokio::fs::create_dir_all(&temp)
            .await
            .map_err(|e| InstallError::io(&temp, e))?;

        let result = self.install_in(&ctx, &temp).await;

        if ctx.options.clear_temp_dir_after_install {
            if let Err(e) = tokio::fs::remove_dir_all(&temp).await {
                warn!("Could not clear Forge temp dir {:?}: {}", temp, e);
            }
        }

        if let Ok(id) = &result {
            info!("Forge {} installed", id);
        }
        result
    }
}

impl ForgeOverlay {
    async fn install_in(&self, ctx: &OverlayContext<'_>, temp: &Path) -> InstallResult<String> {
        let installer_path = self.fetch_installer(ctx, temp).await?;
        let installer = tokio::fs::read(&installer_path)
            .await
            .map_err(|e| InstallError::io(&installer_path, e))?;

        let profile = read_entry(&installer, "install_profile.json")?
            .ok_or_else(|| Self::failure("installer has no install_profile.json"))?;
        let profile: serde_json::Value = serde_json::from_slice(&profile)?;

        if profile.get("versionInfo").is_some() {
            let legacy: LegacyInstallProfile = serde_json::from_value(profile)?;
            return self.install_legacy(ctx, &installer, legacy).await;
        }

        let generated = read_entry(&installer, "version.json")?
            .ok_or_else(|| Self::failure("installer has no version.json"))?;
        let generated = VersionJson::from_slice(&generated)?;
        self.install_modern(ctx, &installer_path, temp, generated)
            .await
    }
}

fn read_entry(archive: &[u8], name: &str) -> InstallResult<Option<Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| InstallError::io(name, e))?;
    Ok(Some(bytes))
}

async fn copy_file(from: &Path, to: &Path) -> InstallResult<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::io(parent, e))?;
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| InstallError::io(from, e))?;
    Ok(())
}

/// Copy every file under `from` to the same relative path under `to`.
async fn copy_tree(from: &Path, to: &Path) -> InstallResult<usize> {
    let mut pending = vec![from.to_path_buf()];
    let mut copied = 0;
    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(InstallError::io(&dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| InstallError::io(&dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| InstallError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(from) else {
                continue;
            };
            copy_file(&path, &to.join(relative)).await?;
            copied += 1;
        }
    }
    Ok(copied)
}
