//! Content digests for change detection
//!
//! Watched plugin files are compared by a 32-byte blake3 digest of their
//! full contents.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Fixed-size digest of a file's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDigest(blake3::Hash);

impl FileDigest {
    /// Digests an in-memory buffer
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes))
    }

    /// Reads a whole file and digests it
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Returns the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Returns a short hex prefix for log output
    pub fn short(&self) -> String {
        self.0.to_hex()[..7].to_string()
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.to_hex())
    }
}
