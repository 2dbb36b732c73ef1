use async_trait::async_trait;
use tracing::info;

use crate::core::error::InstallResult;
use crate::core::install::{install_dependencies, InstallOutcome};
use crate::core::version::ResolvedVersion;

use super::{
    context::OverlayContext, fabric::FabricOverlay, forge::ForgeOverlay,
    liteloader::LiteLoaderOverlay,
};

/// A mod loader that derives a version manifest from an installed base.
#[async_trait]
pub trait OverlayInstaller: Send + Sync {
    /// Write the derived manifest under `versions/` and return its id. Never
    /// downloads libraries; that is left to `install_dependencies`.
    async fn install(&self, ctx: OverlayContext<'_>) -> InstallResult<String>;
}

/// Static dispatch over the supported loaders.
pub enum LoaderOverlay {
    Forge(ForgeOverlay),
    Fabric(FabricOverlay),
    LiteLoader(LiteLoaderOverlay),
}

impl LoaderOverlay {
    pub fn name(&self) -> &'static str {
        match self {
            LoaderOverlay::Forge(_) => "Forge",
            LoaderOverlay::Fabric(_) => "Fabric",
            LoaderOverlay::LiteLoader(_) => "LiteLoader",
        }
    }

    pub async fn install(&self, ctx: OverlayContext<'_>) -> InstallResult<String> {
        match self {
            LoaderOverlay::Forge(i) => i.install(ctx).await,
            LoaderOverlay::Fabric(i) => i.install(ctx).await,
            LoaderOverlay::LiteLoader(i) => i.install(ctx).await,
        }
    }

    /// Register the overlay, then fetch whatever its merged manifest needs.
    pub async fn install_with_dependencies(
        &self,
        ctx: OverlayContext<'_>,
    ) -> InstallResult<InstallOutcome> {
        let id = self.install(ctx).await?;
        info!("{} overlay {} registered, installing dependencies", self.name(), id);
        let version = ResolvedVersion::parse(ctx.location, &id).await?;
        install_dependencies(&version, ctx.location, ctx.options).await
    }
}

impl From<ForgeOverlay> for LoaderOverlay {
    fn from(overlay: ForgeOverlay) -> Self {
        LoaderOverlay::Forge(overlay)
    }
}

impl From<FabricOverlay> for LoaderOverlay {
    fn from(overlay: FabricOverlay) -> Self {
        LoaderOverlay::Fabric(overlay)
    }
}

impl From<LiteLoaderOverlay> for LoaderOverlay {
    fn from(overlay: LiteLoaderOverlay) -> Self {
        LoaderOverlay::LiteLoader(overlay)
    }
}
