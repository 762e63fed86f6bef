//! Disk-based key-value store for cache persistence across sessions.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::CacheEntry;
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::KeyValueStore;

const ENTRY_EXTENSION: &str = "entry";
const LOCK_STRIPES: usize = 64;

/// On-disk representation of one entry.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    key: String,
    expires_at: DateTime<Utc>,
    payload: String,
}

impl EntryRecord {
    fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key.clone(),
            expires_at: entry.expires_at,
            payload: general_purpose::STANDARD.encode(&entry.payload),
        }
    }

    fn into_entry(self) -> CacheResult<CacheEntry> {
        let payload = general_purpose::STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| CacheError::corrupt(format!("invalid payload encoding: {e}")))?;
        Ok(CacheEntry::new(self.key, payload, self.expires_at))
    }
}

/// Key-value store keeping one JSON record file per key.
///
/// File names are the SHA-256 of the key, so each key maps to exactly one
/// file. Writes go through a temporary file that is renamed over the old
/// record, and writers to the same key are serialized by a striped lock.
pub struct DiskKeyValueStore {
    cache_dir: PathBuf,
    locks: Vec<Mutex<()>>,
}

impl std::fmt::Debug for DiskKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskKeyValueStore")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl DiskKeyValueStore {
    /// Creates a store in the specified directory.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created.
    pub async fn new(cache_dir: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CacheError::io(format!("Failed to create cache dir: {e}")))?;

        Ok(Self {
            cache_dir,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    /// Returns the directory holding the records.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the number of record files on disk.
    pub async fn len(&self) -> usize {
        let Ok(mut entries) = fs::read_dir(&self.cache_dir).await else {
            return 0;
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if is_record(&entry.path()) {
                count += 1;
            }
        }
        count
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn digest(key: &str) -> [u8; 32] {
        Sha256::digest(key.as_bytes()).into()
    }

    fn record_path(&self, digest: &[u8; 32]) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{ENTRY_EXTENSION}", hex::encode(digest)))
    }

    fn lock_for(&self, digest: &[u8; 32]) -> &Mutex<()> {
        &self.locks[usize::from(digest[0]) % self.locks.len()]
    }

    async fn read_record(&self, key: &str, path: &Path) -> CacheResult<Option<CacheEntry>> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(key = %key, "Disk store miss");
                return Ok(None);
            }
            Err(e) => return Err(CacheError::io(format!("Failed to read record: {e}"))),
        };

        let record: EntryRecord = serde_json::from_slice(&content)
            .map_err(|e| CacheError::corrupt(format!("Failed to parse record: {e}")))?;

        if record.key != key {
            warn!(key = %key, stored = %record.key, "Record key mismatch, treating as miss");
            return Ok(None);
        }

        trace!(key = %key, path = %path.display(), "Disk store hit");
        record.into_entry().map(Some)
    }

    async fn remove_record(&self, key: &str, path: &Path) -> CacheResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(key = %key, "Removed record from disk store");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(format!("Failed to remove record: {e}"))),
        }
    }
}

#[async_trait]
impl KeyValueStore for DiskKeyValueStore {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let path = self.record_path(&Self::digest(key));
        self.read_record(key, &path).await
    }

    async fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        let digest = Self::digest(&entry.key);
        let path = self.record_path(&digest);
        let content = serde_json::to_vec(&EntryRecord::from_entry(&entry))
            .map_err(|e| CacheError::serialization(e.to_string()))?;
        let dir = self.cache_dir.clone();
        let size = entry.payload.len();

        let _guard = self.lock_for(&digest).lock().await;

        let target = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp_file = tempfile::NamedTempFile::new_in(&dir)?;
            temp_file.write_all(&content)?;
            temp_file.as_file().sync_all()?;
            temp_file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::io(format!("Write task panicked: {e}")))?
        .map_err(|e| CacheError::io(format!("Failed to write record: {e}")))?;

        debug!(key = %entry.key, path = %path.display(), size, "Stored record in disk store");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let digest = Self::digest(key);
        let path = self.record_path(&digest);
        let _guard = self.lock_for(&digest).lock().await;
        self.remove_record(key, &path).await
    }

    async fn delete_expired(&self, key: &str, now: DateTime<Utc>) -> CacheResult<bool> {
        let digest = Self::digest(key);
        let path = self.record_path(&digest);
        let _guard = self.lock_for(&digest).lock().await;

        match self.read_record(key, &path).await? {
            Some(entry) if entry.is_expired_at(now) => {
                self.remove_record(key, &path).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut entries = fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| CacheError::io(format!("Failed to read cache dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(format!("Failed to read entry: {e}")))?
        {
            let path = entry.path();
            if is_record(&path) && fs::remove_file(&path).await.is_err() {
                warn!(path = %path.display(), "Failed to remove cache record");
            }
        }
        debug!("Cleared disk store");
        Ok(())
    }
}

fn is_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "linuxmobile", "fetchkit").map_or_else(
        || {
            std::env::temp_dir()
                .join("fetchkit")
                .join("cache")
                .join("entries")
        },
        |dirs| dirs.cache_dir().join("entries"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn create_test_store() -> (DiskKeyValueStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskKeyValueStore::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        (store, temp_dir)
    }

    fn entry(key: &str, payload: &'static [u8]) -> CacheEntry {
        CacheEntry::new(key, payload, Utc::now() + Duration::minutes(5))
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _temp) = create_test_store().await;
        let stored = entry("https://x/img.png", b"png bytes");

        store.put(stored.clone()).await.unwrap();
        let retrieved = store.get("https://x/img.png").await.unwrap();

        assert_eq!(retrieved, Some(stored));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let (store, _temp) = create_test_store().await;
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_single_record() {
        let (store, _temp) = create_test_store().await;

        store.put(entry("k", b"first")).await.unwrap();
        store.put(entry("k", b"second")).await.unwrap();

        assert_eq!(store.len().await, 1);
        let retrieved = store.get("k").await.unwrap().unwrap();
        assert_eq!(&retrieved.payload[..], b"second");
    }

    #[tokio::test]
    async fn test_concurrent_writes_same_key() {
        let (store, _temp) = create_test_store().await;
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put(CacheEntry::new("k", vec![i], Utc::now() + Duration::minutes(1)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len().await, 1);
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp) = create_test_store().await;

        store.put(entry("k", b"v")).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_entry() {
        let (store, _temp) = create_test_store().await;
        let now = Utc::now();
        store
            .put(CacheEntry::new("k", &b"v"[..], now + Duration::minutes(1)))
            .await
            .unwrap();

        assert!(!store.delete_expired("k", now).await.unwrap());
        assert!(store.get("k").await.unwrap().is_some());

        assert!(store.delete_expired("k", now + Duration::minutes(1)).await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_error() {
        let (store, _temp) = create_test_store().await;
        let path = store.record_path(&DiskKeyValueStore::digest("k"));
        std::fs::write(&path, b"not json").unwrap();

        let result = store.get("k").await;
        assert!(matches!(result, Err(CacheError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, _temp) = create_test_store().await;

        store.put(entry("a", b"1")).await.unwrap();
        store.put(entry("b", b"2")).await.unwrap();
        assert_eq!(store.len().await, 2);

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}
