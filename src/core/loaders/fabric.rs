use async_trait::async_trait;
use tracing::info;

use super::context::OverlayContext;
use super::installer::OverlayInstaller;
use crate::core::error::{InstallError, InstallResult};
use crate::core::maven::FABRIC_MAVEN;
use crate::core::version::{LibraryEntry, VersionJson};

/// Fabric on top of an installed vanilla version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricOverlay {
    /// Yarn mappings version, e.g. `1.14.1+build.10`.
    pub yarn_version: String,
    /// Loader version, e.g. `0.4.7+build.147`.
    pub loader_version: String,
}

impl FabricOverlay {
    pub fn new(yarn_version: impl Into<String>, loader_version: impl Into<String>) -> Self {
        Self {
            yarn_version: yarn_version.into(),
            loader_version: loader_version.into(),
        }
    }

    /// Minecraft version the yarn build targets.
    pub fn minecraft_version(&self) -> &str {
        self.yarn_version
            .split_once("+build")
            .map(|(mc, _)| mc)
            .unwrap_or(&self.yarn_version)
    }

    pub fn version_id(&self) -> String {
        format!(
            "{}-fabric{}-{}",
            self.minecraft_version(),
            self.yarn_version,
            self.loader_version
        )
    }

    async fn fetch_profile(&self, ctx: &OverlayContext<'_>) -> InstallResult<VersionJson> {
        let url = format!(
            "{}/v2/versions/loader/{}/{}/profile/json",
            ctx.options.repositories.fabric_meta.trim_end_matches('/'),
            self.minecraft_version(),
            self.loader_version
        );
        let bytes = ctx.downloader.fetch_bytes(&url).await?;
        let profile = VersionJson::from_slice(&bytes)?;

        if profile.main_class.as_deref().unwrap_or_default().is_empty() {
            return Err(InstallError::LoaderInstallerFailure {
                loader: "Fabric".into(),
                message: format!("profile from {} has no main class", url),
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        Ok(profile)
    }

    fn ensure_library(libraries: &mut Vec<LibraryEntry>, coordinate: String) {
        if libraries.iter().any(|lib| lib.name == coordinate) {
            return;
        }
        let mut library = LibraryEntry::named(coordinate);
        library.url = Some(format!("{}/", FABRIC_MAVEN));
        libraries.push(library);
    }

    /// Shape the meta profile into the manifest written to disk.
    fn derive_manifest(&self, mut profile: VersionJson) -> VersionJson {
        profile.id = self.version_id();
        if profile.inherits_from.is_none() {
            profile.inherits_from = Some(self.minecraft_version().to_string());
        }
        for library in &mut profile.libraries {
            if library.downloads.is_none() && library.url.is_none() {
                library.url = Some(format!("{}/", FABRIC_MAVEN));
            }
        }
        Self::ensure_library(
            &mut profile.libraries,
            format!("net.fabricmc:yarn:{}", self.yarn_version),
        );
        Self::ensure_library(
            &mut profile.libraries,
            format!("net.fabricmc:fabric-loader:{}", self.loader_version),
        );
        profile
    }
}

#[async_trait]
impl OverlayInstaller for FabricOverlay {
    async fn install(&self, ctx: OverlayContext<'_>) -> InstallResult<String> {
        info!(
            "Installing Fabric {} (yarn {}) for Minecraft {}",
            self.loader_version,
            self.yarn_version,
            self.minecraft_version()
        );

        let profile = self.fetch_profile(&ctx).await?;
        let manifest = self.derive_manifest(profile);
        let path = manifest.write(ctx.location).await?;

        info!("Fabric registered as {} at {:?}", manifest.id, path);
        Ok(manifest.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{InstallOptions, Repositories};
    use crate::core::downloader::Downloader;
    use crate::core::location::MinecraftFolder;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn overlay() -> FabricOverlay {
        FabricOverlay::new("1.14.1+build.10", "0.4.7+build.147")
    }

    #[test]
    fn id_is_composed_from_yarn_and_loader() {
        assert_eq!(overlay().minecraft_version(), "1.14.1");
        assert_eq!(
            overlay().version_id(),
            "1.14.1-fabric1.14.1+build.10-0.4.7+build.147"
        );
    }

    #[test]
    fn ensure_library_keeps_coordinates_unique() {
        let mut libs = vec![LibraryEntry::named("net.fabricmc:fabric-loader:0.4.7+build.147")];
        FabricOverlay::ensure_library(
            &mut libs,
            "net.fabricmc:fabric-loader:0.4.7+build.147".to_string(),
        );
        FabricOverlay::ensure_library(&mut libs, "net.fabricmc:yarn:1.14.1+build.10".to_string());
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[1].url.as_deref(), Some("https://maven.fabricmc.net/"));
    }

    #[tokio::test]
    async fn writes_manifest_inheriting_from_minecraft() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/versions/loader/1.14.1/0.4.7+build.147/profile/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "fabric-loader-0.4.7+build.147-1.14.1",
                "inheritsFrom": "1.14.1",
                "type": "release",
                "mainClass": "net.fabricmc.loader.launch.knot.KnotClient",
                "arguments": {"game": []},
                "libraries": [
                    {"name": "net.fabricmc:intermediary:1.14.1", "url": "https://maven.fabricmc.net/"},
                    {"name": "org.ow2.asm:asm:7.1"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let location = MinecraftFolder::new(dir.path());
        let options = InstallOptions::default().with_repositories(Repositories {
            fabric_meta: server.uri(),
            ..Repositories::default()
        });
        let downloader = Downloader::from_options(&options).unwrap();

        let id = overlay()
            .install(OverlayContext::new(&location, &options, &downloader))
            .await
            .unwrap();

        assert_eq!(id, "1.14.1-fabric1.14.1+build.10-0.4.7+build.147");
        let written = VersionJson::read(&location, &id).await.unwrap();
        assert_eq!(written.inherits_from.as_deref(), Some("1.14.1"));
        assert_eq!(
            written.main_class.as_deref(),
            Some("net.fabricmc.loader.launch.knot.KnotClient")
        );
        let names: Vec<_> = written.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "net.fabricmc:intermediary:1.14.1",
                "org.ow2.asm:asm:7.1",
                "net.fabricmc:yarn:1.14.1+build.10",
                "net.fabricmc:fabric-loader:0.4.7+build.147"
            ]
        );
        assert!(written.libraries.iter().all(|l| l.url.is_some()));
    }

    #[tokio::test]
    async fn missing_profile_is_a_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let location = MinecraftFolder::new(dir.path());
        let options = InstallOptions::default().with_repositories(Repositories {
            fabric_meta: server.uri(),
            ..Repositories::default()
        });
        let downloader = Downloader::from_options(&options).unwrap();

        let err = overlay()
            .install(OverlayContext::new(&location, &options, &downloader))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::NetworkFailure { .. }));
    }
}
