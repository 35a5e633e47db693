//! Content fingerprinting.
//!
//! A fingerprint is the hex SHA-256 digest of a file's bytes. Two files
//! with identical content always have identical fingerprints, so change
//! detection does not depend on modification times.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read size used while hashing.
pub const FINGERPRINT_CHUNK: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an existing hex digest (e.g. one read from the sidecar file).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Returns the digest as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint of the file at `path`.
///
/// The file is streamed in [`FINGERPRINT_CHUNK`] pieces, so memory use is
/// constant regardless of database size.
///
/// # Errors
///
/// Returns [`crate::CoreError::Io`] if the file cannot be opened or read.
pub fn fingerprint(path: &Path) -> CoreResult<Fingerprint> {
    let mut file = File::open(path)?;
    fingerprint_reader(&mut file)
}

/// Computes the fingerprint of everything `reader` yields.
///
/// # Errors
///
/// Returns an error if reading fails.
pub fn fingerprint_reader(reader: &mut dyn Read) -> CoreResult<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; FINGERPRINT_CHUNK];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}
