mod artifact;

pub use artifact::MavenArtifact;

/// Well-known Maven repositories used by the Minecraft ecosystem.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
pub const FABRIC_MAVEN: &str = "https://maven.fabricmc.net";
pub const LITELOADER_SNAPSHOTS: &str = "http://repo.mumfrey.com/content/repositories/snapshots";
pub const LITELOADER_RELEASES: &str = "http://dl.liteloader.com/versions";
