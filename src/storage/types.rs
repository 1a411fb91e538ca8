use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading, writing or renaming a cache file failed
    #[error("Cache I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// Cache Key
// ============================================================================

/// Stable storage key for one feed URL.
///
/// Lowercase hex SHA-256 of the URL bytes: the same URL always maps to the
/// same key, and distinct URLs never share an entry in practice. The key is
/// also safe to use verbatim as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_url(url: &str) -> Self {
        let hash = Sha256::digest(url.as_bytes());
        Self(format!("{:x}", hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Cache Entry
// ============================================================================

/// Raw feed bytes as stored, plus the time they were stored.
///
/// `stored_at` is `None` when the backend cannot report a timestamp
/// (e.g. a filesystem without mtime support).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub bytes: Vec<u8>,
    pub stored_at: Option<DateTime<Utc>>,
}
