use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::types::{CacheEntry, CacheError, CacheKey};
use super::CacheStore;

/// File extension of cache blobs.
const ENTRY_EXTENSION: &str = "feed";

/// Distinguishes temp files created by concurrent writers in one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem cache backend.
///
/// Each key is stored as one `<key>.feed` file holding the exact fetched
/// bytes. The file mtime is the stored-at timestamp. Writes go through a
/// temp file in the same directory and a rename, so readers see either the
/// previous blob or the new one, never a partial write.
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    dir: PathBuf,
}

impl DiskCacheStore {
    /// The directory is created lazily on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Point the store at another directory.
    ///
    /// Entries already written under the old directory stay where they are
    /// and are not visible through this store anymore.
    pub fn set_cache_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dir = dir.into();
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }
}

impl CacheStore for DiskCacheStore {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        // Bytes and timestamp come from the same handle, so a concurrent
        // rename cannot pair new bytes with an old mtime.
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| CacheError::io(&path, e))?;
        let stored_at = modified_at(&file, &path);

        Ok(Some(CacheEntry { bytes, stored_at }))
    }

    fn stored_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, CacheError> {
        let path = self.entry_path(key);
        match File::open(&path) {
            Ok(file) => Ok(modified_at(&file, &path)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        let path = self.entry_path(key);
        write_atomic(&path, bytes)?;
        tracing::debug!(key = %key, path = %path.display(), bytes = bytes.len(), "Cache entry written");
        Ok(())
    }
}

fn modified_at(file: &File, path: &Path) -> Option<DateTime<Utc>> {
    match file.metadata().and_then(|meta| meta.modified()) {
        Ok(time) => Some(DateTime::<Utc>::from(time)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Cache entry has no modification time");
            None
        }
    }
}

/// Write `bytes` to `dst` using the write-to-temp-then-rename pattern.
fn write_atomic(dst: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    // SEC-009: Unpredictable temp name plus create_new, so a pre-planted
    // symlink at the temp path makes the write fail instead of following it.
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = dst.with_extension(format!(
        "{ENTRY_EXTENSION}.tmp.{}.{counter}.{nanos:x}",
        std::process::id()
    ));

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| CacheError::io(&temp_path, e))?;

    let written = temp_file
        .write_all(bytes)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(CacheError::io(&temp_path, e));
    }

    // Rename is atomic on the same filesystem and replaces an existing target
    if let Err(e) = fs::rename(&temp_path, dst) {
        let _ = fs::remove_file(&temp_path);
        return Err(CacheError::io(dst, e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("feedjson_disk_test_{name}"));
        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_file(&dir);
        dir
    }

    #[test]
    fn test_missing_entry_is_none() {
        let dir = test_dir("missing");
        let store = DiskCacheStore::new(&dir);
        let key = CacheKey::for_url("https://example.com/rss");

        assert!(store.load(&key).unwrap().is_none());
        assert!(store.stored_at(&key).unwrap().is_none());
        assert!(!dir.exists(), "reads must not create the directory");
    }

    #[test]
    fn test_store_creates_dir_and_roundtrips() {
        let dir = test_dir("roundtrip");
        let store = DiskCacheStore::new(&dir);
        let key = CacheKey::for_url("https://example.com/rss");
        let before = Utc::now() - chrono::Duration::seconds(2);

        store.store(&key, b"<rss version=\"2.0\"/>").unwrap();

        assert!(store.entry_path(&key).is_file());
        let entry = store.load(&key).unwrap().unwrap();
        assert_eq!(entry.bytes, b"<rss version=\"2.0\"/>");
        assert!(entry.stored_at.unwrap() >= before);
        assert_eq!(store.stored_at(&key).unwrap(), entry.stored_at);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_entry_file_named_after_key() {
        let store = DiskCacheStore::new("/var/cache/feedjson");
        let key = CacheKey::for_url("https://example.com/rss");
        assert_eq!(
            store.entry_path(&key),
            PathBuf::from(format!("/var/cache/feedjson/{}.feed", key.as_str()))
        );
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let dir = test_dir("overwrite");
        let store = DiskCacheStore::new(&dir);
        let key = CacheKey::for_url("https://example.com/rss");

        store.store(&key, b"first").unwrap();
        store.store(&key, b"second").unwrap();

        assert_eq!(store.load(&key).unwrap().unwrap().bytes, b"second");
        let names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{}.feed", key.as_str())]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_blob_distinct_from_missing() {
        let dir = test_dir("empty_blob");
        let store = DiskCacheStore::new(&dir);
        let key = CacheKey::for_url("https://example.com/rss");

        store.store(&key, b"").unwrap();

        let entry = store.load(&key).unwrap();
        assert_eq!(entry.map(|e| e.bytes), Some(Vec::new()));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_set_cache_dir_does_not_migrate() {
        let old_dir = test_dir("migrate_old");
        let new_dir = test_dir("migrate_new");
        let mut store = DiskCacheStore::new(&old_dir);
        let key = CacheKey::for_url("https://example.com/rss");

        store.store(&key, b"cached").unwrap();
        store.set_cache_dir(&new_dir);

        assert_eq!(store.cache_dir(), new_dir.as_path());
        assert!(store.load(&key).unwrap().is_none());
        assert!(old_dir
            .join(format!("{}.feed", key.as_str()))
            .is_file());

        fs::remove_dir_all(&old_dir).ok();
        fs::remove_dir_all(&new_dir).ok();
    }

    #[test]
    fn test_store_into_file_path_fails() {
        let dir = test_dir("not_a_dir");
        fs::create_dir_all(dir.parent().unwrap()).unwrap();
        fs::write(&dir, b"occupied").unwrap();

        let store = DiskCacheStore::new(&dir);
        let key = CacheKey::for_url("https://example.com/rss");
        let err = store.store(&key, b"bytes").unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));

        fs::remove_file(&dir).ok();
    }
}
