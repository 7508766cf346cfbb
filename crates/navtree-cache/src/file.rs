//! File-based cache store.
//!
//! [`FileStore`] keeps each entry as a single file under a root directory, so
//! that independent processes pointed at the same directory see each other's
//! writes and deletes. Each file carries a binary header followed by the data:
//!
//! ```text
//! [expires_at: u64 LE, unix seconds][data bytes]
//! ```
//!
//! On read, only the header is read first to check expiry. The data is read
//! only when the entry is still live.
//!
//! On construction, [`FileStore`] validates a `VERSION` file in the root. If the
//! version mismatches or is missing, the entire directory is wiped and
//! recreated, so caches written by an incompatible build are never decoded.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::CacheStore;

/// File-based [`CacheStore`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION            # contains the cache version string
/// +-- navtree            # composite tree entry
/// +-- navtree_reset      # cross-process reset flag
/// ```
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a file store at `root`, validating the cache version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the entire
    /// directory is removed and recreated. Errors during validation are logged
    /// but never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut file = File::open(self.entry_path(key)).ok()?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header).ok()?;
        let expires_at = u64::from_le_bytes(header);

        if expires_at <= now_secs() {
            tracing::debug!(key, "cache entry expired");
            return None;
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data).ok()?;
        Some(data)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        // Silently ignore errors - a failed write is a later miss
        if let Err(e) = fs::create_dir_all(&self.root) {
            tracing::debug!(error = %e, "Failed to create cache directory");
            return;
        }

        let expires_at = now_secs().saturating_add(ttl.as_secs());
        let mut buf = Vec::with_capacity(8 + value.len());
        buf.extend_from_slice(&expires_at.to_le_bytes());
        buf.extend_from_slice(value);

        // Write-then-rename keeps concurrent readers from seeing a torn entry
        let tmp = self.root.join(format!(".{key}.tmp.{}", std::process::id()));
        if let Err(e) = fs::write(&tmp, &buf) {
            tracing::debug!(error = %e, key, "Failed to write cache entry");
            return;
        }
        if let Err(e) = fs::rename(&tmp, self.entry_path(key)) {
            tracing::debug!(error = %e, key, "Failed to move cache entry into place");
            let _ = fs::remove_file(&tmp);
        }
    }

    fn delete(&self, key: &str) {
        let path = self.entry_path(key);
        if path.exists()
            && let Err(e) = fs::remove_file(&path)
        {
            tracing::debug!(error = %e, key, "Failed to remove cache entry");
        }
    }
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write cache VERSION file: {e}");
    }
}
