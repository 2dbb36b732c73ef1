// ─── Install Orchestrator ───
// Runs one install as a tree of phases:
//   fetch-json → fetch-jar → fetch-libraries → fetch-asset-index → fetch-assets
// Each phase holds one leaf per artifact. Leaves within a phase run on a
// bounded pool; a failed leaf is recorded and its siblings keep going.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::assets::AssetIndex;
use crate::core::config::InstallOptions;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{ArtifactFailure, InstallError, InstallResult, TaskFailures};
use crate::core::location::{InstallSide, MinecraftFolder};
use crate::core::resolver::{ArtifactDescriptor, ArtifactResolver};
use crate::core::task::TaskNode;
use crate::core::verify::verify;
use crate::core::version::{ResolvedVersion, VersionJson, VersionMeta};

/// Result of a finished install: the merged version and the settled tree.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub version: ResolvedVersion,
    pub tree: TaskNode,
}

enum LeafOutcome {
    /// Already present and acceptable.
    Skipped,
    Downloaded,
    Cancelled,
    Failed(InstallError),
}

/// Shared state of the artifact phases.
struct PhaseRunner<'a> {
    location: &'a MinecraftFolder,
    downloader: &'a Downloader,
    cancel: &'a CancellationToken,
    checksum: bool,
}

impl PhaseRunner<'_> {
    async fn ensure(&self, artifact: &ArtifactDescriptor) -> InstallResult<bool> {
        let dest = artifact.absolute(self.location);
        let present = if self.checksum {
            verify(&dest, artifact.hash.as_deref(), artifact.size)
                .await?
                .is_valid()
        } else {
            tokio::fs::metadata(&dest)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
        };
        if present {
            debug!("Up to date: {}", artifact.name);
            return Ok(false);
        }

        let Some(url) = &artifact.url else {
            return Err(InstallError::Other(format!(
                "{} is missing and has no download location",
                artifact.name
            )));
        };
        let entry = DownloadEntry {
            url: url.clone(),
            dest,
            hash: artifact.hash.clone(),
            size: artifact.size,
        };
        self.downloader.download_with_retry(&entry, self.cancel).await?;
        Ok(true)
    }

    async fn run_leaf(&self, artifact: &ArtifactDescriptor) -> LeafOutcome {
        if self.cancel.is_cancelled() {
            return LeafOutcome::Cancelled;
        }
        match self.ensure(artifact).await {
            Ok(true) => LeafOutcome::Downloaded,
            Ok(false) => LeafOutcome::Skipped,
            Err(e) => LeafOutcome::Failed(e),
        }
    }

    fn record(
        &self,
        leaf: &mut TaskNode,
        artifact: &ArtifactDescriptor,
        outcome: LeafOutcome,
        failures: &mut Vec<ArtifactFailure>,
    ) -> InstallResult<()> {
        match outcome {
            LeafOutcome::Cancelled => leaf.cancel(),
            LeafOutcome::Skipped | LeafOutcome::Downloaded => {
                leaf.start()?;
                leaf.succeed()
            }
            LeafOutcome::Failed(e) => {
                warn!("Failed {}: {}", artifact.name, e);
                leaf.start()?;
                leaf.fail(e.to_string())?;
                failures.push(ArtifactFailure {
                    name: artifact.name.clone(),
                    path: artifact.absolute(self.location),
                    url: artifact.url.clone(),
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    async fn run_phase(
        &self,
        name: &str,
        artifacts: &[ArtifactDescriptor],
        failures: &mut Vec<ArtifactFailure>,
    ) -> InstallResult<TaskNode> {
        info!("{}: {} artifact(s)", name, artifacts.len());
        let leaves = artifacts
            .iter()
            .map(|a| TaskNode::leaf(a.name.clone()))
            .collect();
        let mut phase = TaskNode::group(name, leaves);
        phase.start()?;

        let mut outcomes = stream::iter(artifacts.iter().enumerate())
            .map(|(i, artifact)| async move { (i, self.run_leaf(artifact).await) })
            .buffer_unordered(self.downloader.concurrency());

        while let Some((i, outcome)) = outcomes.next().await {
            if let (Some(leaf), Some(artifact)) = (phase.children.get_mut(i), artifacts.get(i)) {
                self.record(leaf, artifact, outcome, failures)?;
            }
        }

        phase.settle_from_children()?;
        Ok(phase)
    }

    /// Everything below the version json: jar, libraries, asset index, assets.
    async fn run_dependencies(
        &self,
        resolver: &ArtifactResolver,
        version: &ResolvedVersion,
        root: &mut TaskNode,
        failures: &mut Vec<ArtifactFailure>,
    ) -> InstallResult<()> {
        let mut artifacts = resolver.resolve(version, None)?;

        let jar = self
            .run_phase("fetch-jar", std::slice::from_ref(&artifacts.version_jar), failures)
            .await?;
        root.children.push(jar);

        let libraries = self
            .run_phase("fetch-libraries", &artifacts.libraries, failures)
            .await?;
        root.children.push(libraries);

        let Some(index_artifact) = artifacts.asset_index.clone() else {
            return Ok(());
        };

        let mut phase = TaskNode::group(
            "fetch-asset-index",
            vec![TaskNode::leaf(index_artifact.name.clone())],
        );
        phase.start()?;
        let outcome = self.run_leaf(&index_artifact).await;
        let loaded = match outcome {
            LeafOutcome::Skipped | LeafOutcome::Downloaded => {
                match AssetIndex::read(self.location, &index_artifact.name).await {
                    Ok(Some(index)) => Ok(index),
                    Ok(None) => Err(InstallError::Other(format!(
                        "asset index {} vanished after download",
                        index_artifact.name
                    ))),
                    Err(e) => Err(e),
                }
            }
            LeafOutcome::Cancelled => Err(InstallError::Cancelled),
            LeafOutcome::Failed(e) => Err(e),
        };
        let index = match loaded {
            Ok(index) => {
                if let Some(leaf) = phase.children.first_mut() {
                    self.record(leaf, &index_artifact, LeafOutcome::Downloaded, failures)?;
                }
                Some(index)
            }
            Err(InstallError::Cancelled) => {
                if let Some(leaf) = phase.children.first_mut() {
                    leaf.cancel()?;
                }
                None
            }
            Err(e) => {
                if let Some(leaf) = phase.children.first_mut() {
                    self.record(leaf, &index_artifact, LeafOutcome::Failed(e), failures)?;
                }
                None
            }
        };
        phase.settle_from_children()?;
        root.children.push(phase);

        // Without an index there is nothing to enumerate.
        let Some(index) = index else {
            return Ok(());
        };
        resolver.add_assets(&mut artifacts, &index)?;
        let assets = self
            .run_phase("fetch-assets", &artifacts.assets, failures)
            .await?;
        root.children.push(assets);
        Ok(())
    }
}

/// Settle `root` and turn its bookkeeping into the call's result.
fn conclude(
    mut root: TaskNode,
    version: ResolvedVersion,
    cancel: &CancellationToken,
    failures: Vec<ArtifactFailure>,
) -> InstallResult<InstallOutcome> {
    if cancel.is_cancelled() {
        root.cancel_pending();
    }
    root.settle_from_children()?;

    if !failures.is_empty() {
        return Err(InstallError::Aggregate(TaskFailures { failures }));
    }
    if cancel.is_cancelled() {
        return Err(InstallError::Cancelled);
    }
    info!("Installed {} ({} phases)", version.id, root.children.len());
    Ok(InstallOutcome {
        version,
        tree: root,
    })
}

// ─── Install Task ───

/// One version install, built up front and consumed by [`InstallTask::execute`].
pub struct InstallTask {
    side: InstallSide,
    meta: VersionMeta,
    location: MinecraftFolder,
    options: InstallOptions,
    downloader: Downloader,
    cancel: CancellationToken,
    known_manifest: Option<VersionJson>,
}

pub fn install_task(
    side: InstallSide,
    meta: VersionMeta,
    location: MinecraftFolder,
    options: InstallOptions,
) -> InstallResult<InstallTask> {
    let downloader = Downloader::from_options(&options)?;
    Ok(InstallTask {
        side,
        meta,
        location,
        options,
        downloader,
        cancel: CancellationToken::new(),
        known_manifest: None,
    })
}

impl InstallTask {
    /// Token that cancels this task; clones may be handed to other tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Use an already-fetched manifest instead of downloading it.
    pub fn with_manifest(mut self, manifest: VersionJson) -> Self {
        self.known_manifest = Some(manifest);
        self
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub async fn execute(self) -> InstallResult<InstallOutcome> {
        let id = self.meta.id.clone();
        info!("Installing {} {}", self.side, id);

        let mut root = TaskNode::group(format!("install {}", id), Vec::new());
        root.start()?;

        let json_phase = self.fetch_json().await?;
        root.children.push(json_phase);

        let version = ResolvedVersion::parse(&self.location, &id).await?;
        let resolver = ArtifactResolver::from_options(self.side, &self.options);
        let runner = PhaseRunner {
            location: &self.location,
            downloader: &self.downloader,
            cancel: &self.cancel,
            checksum: self.options.checksum,
        };
        let mut failures = Vec::new();
        runner
            .run_dependencies(&resolver, &version, &mut root, &mut failures)
            .await?;

        conclude(root, version, &self.cancel, failures)
    }

    /// The manifest every later phase reads from; a failure here is fatal.
    async fn fetch_json(&self) -> InstallResult<TaskNode> {
        let mut leaf = TaskNode::leaf(format!("{}.json", self.meta.id));
        if self.cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        leaf.start()?;

        let result = match &self.known_manifest {
            Some(manifest) => {
                let mut manifest = manifest.clone();
                if manifest.id.is_empty() {
                    manifest.id = self.meta.id.clone();
                }
                manifest.write(&self.location).await.map(|_| ())
            }
            None => self.download_json().await,
        };

        if let Err(e) = result {
            warn!("Version json for {} failed: {}", self.meta.id, e);
            return Err(e);
        }
        leaf.succeed()?;

        let mut phase = TaskNode::group("fetch-json", vec![leaf]);
        phase.settle_from_children()?;
        Ok(phase)
    }

    async fn download_json(&self) -> InstallResult<()> {
        let dest = self.location.version_json(&self.meta.id);
        let sha1 = self.meta.sha1.as_deref();
        let present = if self.options.checksum && sha1.is_some() {
            verify(&dest, sha1, None).await?.is_valid()
        } else {
            tokio::fs::metadata(&dest)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
        };
        if present {
            debug!("Version json {} already present", self.meta.id);
            return Ok(());
        }

        let entry = DownloadEntry {
            url: self.meta.url.clone(),
            dest,
            hash: self.meta.sha1.clone(),
            size: None,
        };
        self.downloader.download_with_retry(&entry, &self.cancel).await
    }
}

/// Install the jar, libraries and assets of an already-parsed version.
/// Used after a loader overlay changed the library set.
pub async fn install_dependencies(
    version: &ResolvedVersion,
    location: &MinecraftFolder,
    options: &InstallOptions,
) -> InstallResult<InstallOutcome> {
    install_dependencies_for(
        InstallSide::Client,
        version,
        location,
        options,
        &CancellationToken::new(),
    )
    .await
}

pub async fn install_dependencies_for(
    side: InstallSide,
    version: &ResolvedVersion,
    location: &MinecraftFolder,
    options: &InstallOptions,
    cancel: &CancellationToken,
) -> InstallResult<InstallOutcome> {
    let downloader = Downloader::from_options(options)?;
    let resolver = ArtifactResolver::from_options(side, options);
    let runner = PhaseRunner {
        location,
        downloader: &downloader,
        cancel,
        checksum: options.checksum,
    };

    let mut root = TaskNode::group(format!("install-dependencies {}", version.id), Vec::new());
    root.start()?;
    let mut failures = Vec::new();
    runner
        .run_dependencies(&resolver, version, &mut root, &mut failures)
        .await?;
    conclude(root, version.clone(), cancel, failures)
}

/// [`install_task`] + execute, then a dependency pass over the manifest as
/// it now stands on disk.
pub async fn install(
    side: InstallSide,
    meta: VersionMeta,
    location: MinecraftFolder,
    options: InstallOptions,
) -> InstallResult<InstallOutcome> {
    let task = install_task(side, meta, location.clone(), options.clone())?;
    let cancel = task.cancellation_token();
    let mut outcome = task.execute().await?;

    let version = ResolvedVersion::parse(&location, &outcome.version.id).await?;
    let dependencies =
        install_dependencies_for(side, &version, &location, &options, &cancel).await?;
    outcome.tree.children.push(dependencies.tree);
    outcome.version = dependencies.version;
    Ok(outcome)
}
