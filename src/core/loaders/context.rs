use crate::core::config::InstallOptions;
use crate::core::downloader::Downloader;
use crate::core::location::MinecraftFolder;

/// Everything an overlay needs to register its manifest.
#[derive(Clone, Copy)]
pub struct OverlayContext<'a> {
    pub location: &'a MinecraftFolder,
    pub options: &'a InstallOptions,
    pub downloader: &'a Downloader,
}

impl<'a> OverlayContext<'a> {
    pub fn new(
        location: &'a MinecraftFolder,
        options: &'a InstallOptions,
        downloader: &'a Downloader,
    ) -> Self {
        Self {
            location,
            options,
            downloader,
        }
    }
}
