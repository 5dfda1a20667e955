//! Remote side of the upload client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH};
use reqwest::{Body, Client};
use tokio::fs::File;
use tracing::debug;

use super::config::StorageConfig;
use super::error::StorageError;
use super::types::{PresignReply, PresignRequest, PresignedUpload};

/// Storage API operations used by the uploader.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Obtain a presigned upload slot for `filename`.
    async fn presign(&self, filename: &str) -> Result<PresignedUpload, StorageError>;

    /// PUT the raw bytes of the file at `path` to a presigned URL and return
    /// how many bytes were sent.
    async fn put(&self, presigned_url: &str, path: &Path) -> Result<u64, StorageError>;
}

/// Storage backend talking to the HTTP storage API.
pub struct HttpStorageBackend {
    client: Client,
    config: StorageConfig,
}

impl HttpStorageBackend {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }
}

#[async_trait]
impl StorageBackend for HttpStorageBackend {
    async fn presign(&self, filename: &str) -> Result<PresignedUpload, StorageError> {
        let url = format!("{}/presigned-url", self.base_url());

        let mut request = self
            .client
            .post(&url)
            .header(ACCEPT, "*/*")
            .json(&PresignRequest { filename });
        if !self.config.auth_token.is_empty() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", self.config.auth_token));
        }

        let response = request.send().await.map_err(StorageError::from_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(StorageError::from_transport)?;

        if !status.is_success() {
            return Err(StorageError::PresignFailed {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let reply: PresignReply = serde_json::from_str(&body).map_err(|e| {
            StorageError::InvalidResponse(format!(
                "{}: {}",
                e,
                body.chars().take(100).collect::<String>()
            ))
        })?;

        let upload = reply.into_upload()?;
        debug!(filename = %filename, key = %upload.key, "Obtained presigned URL");
        Ok(upload)
    }

    async fn put(&self, presigned_url: &str, path: &Path) -> Result<u64, StorageError> {
        let file = File::open(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| StorageError::io(path, e))?
            .len();

        // The signature covers the headers, so no Content-Type is added here.
        // The explicit length keeps the streamed body from going out chunked.
        let response = self
            .client
            .put(presigned_url)
            .header(CONTENT_LENGTH, size)
            .body(Body::from(file))
            .send()
            .await
            .map_err(StorageError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailed {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        debug!(size, status = status.as_u16(), "Uploaded object");
        Ok(size)
    }
}
