//! Mock storage backend for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{PresignedUpload, StorageBackend, StorageError};

/// In-memory implementation of [`StorageBackend`].
///
/// Records every presign request and every successful PUT, and can be told to
/// fail the next call of either kind.
#[derive(Debug)]
pub struct MockStorageBackend {
    presigned: Arc<RwLock<Vec<String>>>,
    puts: Arc<RwLock<Vec<(String, Vec<u8>)>>>,
    fail_presign: Arc<RwLock<Option<u16>>>,
    fail_put: Arc<RwLock<Option<u16>>>,
    delay: Duration,
}

impl Default for MockStorageBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorageBackend {
    pub fn new() -> Self {
        Self {
            presigned: Arc::new(RwLock::new(Vec::new())),
            puts: Arc::new(RwLock::new(Vec::new())),
            fail_presign: Arc::new(RwLock::new(None)),
            fail_put: Arc::new(RwLock::new(None)),
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every presign call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Filenames passed to presign, in call order.
    pub async fn presigned_filenames(&self) -> Vec<String> {
        self.presigned.read().await.clone()
    }

    pub async fn presign_count(&self) -> usize {
        self.presigned.read().await.len()
    }

    /// Successful PUTs as `(url, body)`.
    pub async fn puts(&self) -> Vec<(String, Vec<u8>)> {
        self.puts.read().await.clone()
    }

    /// Make the next presign answer with this HTTP status.
    pub async fn fail_next_presign(&self, status: u16) {
        *self.fail_presign.write().await = Some(status);
    }

    /// Make the next PUT answer with this HTTP status.
    pub async fn fail_next_put(&self, status: u16) {
        *self.fail_put.write().await = Some(status);
    }
}

#[async_trait]
impl StorageBackend for MockStorageBackend {
    async fn presign(&self, filename: &str) -> Result<PresignedUpload, StorageError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.presigned.write().await.push(filename.to_string());

        if let Some(status) = self.fail_presign.write().await.take() {
            return Err(StorageError::PresignFailed {
                status,
                body: "mock presign failure".to_string(),
            });
        }

        Ok(PresignedUpload {
            presigned_url: format!("mock://upload/{}", filename),
            key: format!("translated/{}", filename),
            expires_at: 4_102_444_800,
            access_url: format!("mock://objects/{}", filename),
            access_expires_at: 4_102_444_800,
        })
    }

    async fn put(&self, presigned_url: &str, path: &Path) -> Result<u64, StorageError> {
        if let Some(status) = self.fail_put.write().await.take() {
            return Err(StorageError::UploadFailed {
                status,
                body: "mock upload failure".to_string(),
            });
        }

        let body = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        let size = body.len() as u64;
        self.puts
            .write()
            .await
            .push((presigned_url.to_string(), body));
        Ok(size)
    }
}
