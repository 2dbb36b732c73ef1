pub mod context;
pub mod fabric;
pub mod forge;
pub mod installer;
pub mod liteloader;

pub use context::OverlayContext;
pub use fabric::FabricOverlay;
pub use forge::{ForgeArtifactMeta, ForgeOverlay, ForgeVersionMeta};
pub use installer::{LoaderOverlay, OverlayInstaller};
pub use liteloader::{LiteLoaderOverlay, LiteLoaderVersionMeta};
