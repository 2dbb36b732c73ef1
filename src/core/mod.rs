// ─── mcinstall Core ───
// Installation and diagnosis engine for Minecraft version trees.
//
// Architecture:
//   core/
//     version/    — Remote index, version JSON, inheritance merge, OS rules
//     maven/      — Coordinate parsing and repository paths
//     assets/     — Asset index model
//     resolver    — Version → concrete artifact set
//     verify      — Size and digest checks
//     downloader/ — Streaming downloads with retry
//     task        — Task tree states
//     install/    — Phase orchestration
//     diagnose    — Read-only completeness report
//     loaders/    — Forge, Fabric and LiteLoader overlays

pub mod assets;
pub mod config;
pub mod diagnose;
pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod java;
pub mod loaders;
pub mod location;
pub mod maven;
pub mod resolver;
pub mod task;
pub mod verify;
pub mod version;
