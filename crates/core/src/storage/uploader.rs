//! Content-addressed, deduplicating artifact uploader.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info};

use super::backend::{HttpStorageBackend, StorageBackend};
use super::config::StorageConfig;
use super::error::StorageError;
use super::types::StorageCacheEntry;
use crate::metrics;

/// Block size used when hashing files.
pub const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Uploads a finished artifact and reports where it can be fetched.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Upload the file at `path`.
    ///
    /// Returns `Ok(None)` when uploading is disabled.
    async fn upload(&self, path: &Path) -> Result<Option<StorageCacheEntry>, StorageError>;

    /// Whether uploads can produce entries at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Uploader that skips bytes it has already stored.
///
/// Entries are keyed by SHA-256 of the content. The lookup, upload and cache
/// insert for one digest run under a per-digest lock, so identical content
/// uploaded concurrently reaches the network once.
pub struct DedupUploader {
    backend: Option<Arc<dyn StorageBackend>>,
    cache: RwLock<HashMap<String, StorageCacheEntry>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DedupUploader {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend: Some(backend),
            cache: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// An uploader that never uploads.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            cache: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build from configuration, using the HTTP backend when enabled.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let backend = HttpStorageBackend::new(config.clone())?;
        Ok(Self::new(Arc::new(backend)))
    }

    /// Cached entry for a digest, if any.
    pub async fn cached(&self, digest: &str) -> Option<StorageCacheEntry> {
        self.cache.read().await.get(digest).cloned()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    fn digest_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_for(&self, digest: &str) -> Arc<AsyncMutex<()>> {
        self.digest_locks()
            .entry(digest.to_string())
            .or_default()
            .clone()
    }

    /// Drop the digest's lock once nobody else holds or waits on it.
    fn release_lock(&self, digest: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.digest_locks();
        // One reference in the map plus ours: no other caller is queued.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(digest);
        }
    }

    /// Number of digests with an upload in flight.
    pub fn pending_digests(&self) -> usize {
        self.digest_locks().len()
    }

    async fn upload_with(
        &self,
        backend: &dyn StorageBackend,
        path: &Path,
    ) -> Result<StorageCacheEntry, StorageError> {
        let digest = sha256_file(path).await?;

        let lock = self.lock_for(&digest);
        let outcome = {
            let _guard = lock.lock().await;
            self.upload_locked(backend, path, &digest).await
        };
        self.release_lock(&digest, lock);
        outcome
    }

    async fn upload_locked(
        &self,
        backend: &dyn StorageBackend,
        path: &Path,
        digest: &str,
    ) -> Result<StorageCacheEntry, StorageError> {

        if let Some(entry) = self.cached(digest).await {
            debug!(path = %path.display(), digest = %digest, "Artifact already stored");
            metrics::ARTIFACT_UPLOADS
                .with_label_values(&["cache_hit"])
                .inc();
            return Ok(entry);
        }

        let filename = storage_filename(path, digest);
        let presigned = backend.presign(&filename).await?;

        let size = backend.put(&presigned.presigned_url, path).await?;

        let entry = StorageCacheEntry {
            file_hash: digest.to_string(),
            storage_key: presigned.key,
            access_url: presigned.access_url,
            access_expires_at: presigned.access_expires_at,
            upload_time: Utc::now(),
        };
        self.cache
            .write()
            .await
            .insert(digest.to_string(), entry.clone());

        metrics::ARTIFACT_UPLOADS
            .with_label_values(&["uploaded"])
            .inc();
        metrics::UPLOADED_BYTES.inc_by(size);
        info!(
            path = %path.display(),
            key = %entry.storage_key,
            size,
            "Uploaded artifact"
        );

        Ok(entry)
    }
}

#[async_trait]
impl ArtifactUploader for DedupUploader {
    fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    async fn upload(&self, path: &Path) -> Result<Option<StorageCacheEntry>, StorageError> {
        let Some(backend) = self.backend.as_deref() else {
            metrics::ARTIFACT_UPLOADS
                .with_label_values(&["disabled"])
                .inc();
            return Ok(None);
        };

        match self.upload_with(backend, path).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                metrics::ARTIFACT_UPLOADS.with_label_values(&["failed"]).inc();
                Err(e)
            }
        }
    }
}

/// Hex SHA-256 of a file, read in fixed-size blocks.
pub async fn sha256_file(path: &Path) -> Result<String, StorageError> {
    let file = File::open(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    let mut reader = BufReader::with_capacity(HASH_BLOCK_SIZE, file);
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];
    let mut hasher = Sha256::new();

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Object name derived from the local name and the digest: `<stem>_<hash8><.ext>`.
pub fn storage_filename(path: &Path, digest: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "artifact".to_string());
    let short: String = digest.chars().take(8).collect();

    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, short, ext.to_string_lossy()),
        None => format!("{}_{}", stem, short),
    }
}
