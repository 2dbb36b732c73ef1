// ─── Content Verifier ───
// Size and digest checks for files on disk. Digests are SHA-1 except where a
// loader only publishes MD5; the algorithm follows from the digest length.

use std::path::Path;

use md5::Md5;
use serde::Serialize;
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::core::error::{InstallError, InstallResult};

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Md5,
}

impl HashAlgorithm {
    pub fn for_digest(digest: &str) -> Self {
        if digest.len() == 32 {
            HashAlgorithm::Md5
        } else {
            HashAlgorithm::Sha1
        }
    }
}

/// Incremental hasher over either supported algorithm.
pub enum ContentHasher {
    Sha1(Sha1),
    Md5(Md5),
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => ContentHasher::Sha1(Sha1::new()),
            HashAlgorithm::Md5 => ContentHasher::Md5(Md5::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            ContentHasher::Sha1(h) => h.update(bytes),
            ContentHasher::Md5(h) => h.update(bytes),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            ContentHasher::Sha1(h) => hex::encode(h.finalize()),
            ContentHasher::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Outcome of checking one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Verification {
    Valid,
    Missing,
    SizeMismatch { expected: u64, actual: u64 },
    HashMismatch { expected: String, actual: String },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }

    pub fn describe(&self) -> String {
        match self {
            Verification::Valid => "valid".to_string(),
            Verification::Missing => "missing".to_string(),
            Verification::SizeMismatch { expected, actual } => {
                format!("size mismatch: expected {} bytes, got {}", expected, actual)
            }
            Verification::HashMismatch { expected, actual } => {
                format!("hash mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}

pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// Treats an empty digest the same as no digest.
pub fn expected_digest(hash: Option<&str>) -> Option<&str> {
    hash.map(str::trim).filter(|h| !h.is_empty())
}

/// Check `path` against an expected digest and size. Without a digest only
/// the size is compared; without either, existence suffices.
pub async fn verify(
    path: &Path,
    expected_hash: Option<&str>,
    expected_size: Option<u64>,
) -> InstallResult<Verification> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Ok(Verification::Missing),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Verification::Missing),
        Err(e) => return Err(InstallError::io(path, e)),
    };

    if let Some(expected) = expected_size {
        if metadata.len() != expected {
            return Ok(Verification::SizeMismatch {
                expected,
                actual: metadata.len(),
            });
        }
    }

    let Some(expected) = expected_digest(expected_hash) else {
        return Ok(Verification::Valid);
    };

    let actual = hash_file(path, HashAlgorithm::for_digest(expected)).await?;
    if digests_match(expected, &actual) {
        Ok(Verification::Valid)
    } else {
        Ok(Verification::HashMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Streaming digest of a file.
pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> InstallResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| InstallError::io(path, e))?;
    let mut hasher = ContentHasher::new(algorithm);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let read = file
            .read(&mut buf)
            .await
            .map_err(|e| InstallError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finalize_hex())
}
