use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installation engine.
/// Every module returns `Result<T, InstallError>`.
#[derive(Debug, Error)]
pub enum InstallError {
    // ── Manifest ────────────────────────────────────────
    #[error("Version manifest not found: {id} ({path:?})")]
    ManifestNotFound { id: String, path: PathBuf },

    #[error("Artifact conflict at {path:?}: {first} wants {first_hash}, {second} wants {second_hash}")]
    ArtifactConflict {
        path: PathBuf,
        first: String,
        first_hash: String,
        second: String,
        second_hash: String,
    },

    // ── Integrity ───────────────────────────────────────
    #[error("Verification failed for {path:?}: {reason}")]
    VerificationFailure { path: PathBuf, reason: String },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    // ── Loader ──────────────────────────────────────────
    #[error("{loader} installer failed: {message}\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    LoaderInstallerFailure {
        loader: String,
        message: String,
        stdout: String,
        stderr: String,
    },

    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── Parsing ─────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid rule pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Orchestration ───────────────────────────────────
    #[error("Installation cancelled")]
    Cancelled,

    #[error("{0}")]
    Aggregate(TaskFailures),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type InstallResult<T> = Result<T, InstallError>;

impl InstallError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }

    /// Transport and integrity failures are worth another attempt; everything
    /// else fails the same way twice.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InstallError::Http(_)
                | InstallError::NetworkFailure { .. }
                | InstallError::VerificationFailure { .. }
        )
    }
}

/// One leaf that did not settle successfully.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ArtifactFailure {
    pub name: String,
    pub path: PathBuf,
    pub url: Option<String>,
    pub reason: String,
}

/// Every failed leaf of an install run, collected after all siblings settled.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TaskFailures {
    pub failures: Vec<ArtifactFailure>,
}

impl TaskFailures {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.name.as_str()).collect()
    }
}

impl fmt::Display for TaskFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} artifact(s) failed to install", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {} ({:?}): {}", failure.name, failure.path, failure.reason)?;
        }
        Ok(())
    }
}

// Hosts report errors as plain strings.
impl serde::Serialize for InstallError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_lists_every_failure() {
        let failures = TaskFailures {
            failures: vec![
                ArtifactFailure {
                    name: "a:b:1.0".into(),
                    path: PathBuf::from("libraries/a/b/1.0/b-1.0.jar"),
                    url: None,
                    reason: "HTTP 404".into(),
                },
                ArtifactFailure {
                    name: "icons/icon.png".into(),
                    path: PathBuf::from("assets/objects/ab/abcd"),
                    url: None,
                    reason: "hash mismatch".into(),
                },
            ],
        };

        let message = InstallError::Aggregate(failures).to_string();
        assert!(message.starts_with("2 artifact(s) failed"));
        assert!(message.contains("a:b:1.0"));
        assert!(message.contains("icons/icon.png"));
    }

    #[test]
    fn only_transport_and_integrity_errors_retry() {
        assert!(InstallError::NetworkFailure {
            url: "https://example.com".into(),
            reason: "HTTP 503".into(),
        }
        .is_retryable());
        assert!(InstallError::VerificationFailure {
            path: PathBuf::from("x"),
            reason: "size".into(),
        }
        .is_retryable());
        assert!(!InstallError::Cancelled.is_retryable());
        assert!(!InstallError::Other("boom".into()).is_retryable());
    }
}
