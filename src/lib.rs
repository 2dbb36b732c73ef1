pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::{InstallOptions, Repositories};
pub use crate::core::diagnose::{diagnose, diagnose_side, DiagnosisReport};
pub use crate::core::error::{InstallError, InstallResult};
pub use crate::core::install::{
    install, install_dependencies, install_dependencies_for, install_task, InstallOutcome,
    InstallTask,
};
pub use crate::core::loaders::{
    FabricOverlay, ForgeOverlay, ForgeVersionMeta, LiteLoaderOverlay, LiteLoaderVersionMeta,
    LoaderOverlay, OverlayContext, OverlayInstaller,
};
pub use crate::core::location::{InstallSide, MinecraftFolder};
pub use crate::core::version::{fetch_remote_manifest_index, FetchIndexOptions, ResolvedVersion};

/// Install a `tracing` subscriber filtered by `RUST_LOG`. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mcinstall=debug")),
        )
        .try_init();
}
