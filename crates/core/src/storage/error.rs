//! Error types for the upload client.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while uploading an artifact.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading the local file failed.
    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// Request timed out.
    #[error("Storage request timed out")]
    Timeout,

    /// Could not reach the storage API.
    #[error("Storage connection failed: {0}")]
    ConnectionFailed(String),

    /// Any other transport failure.
    #[error("Storage request failed: {0}")]
    Request(String),

    /// Presign endpoint answered with a non-success status.
    #[error("Presign request failed with HTTP {status}: {body}")]
    PresignFailed { status: u16, body: String },

    /// Presign endpoint answered with an application error code.
    #[error("Storage API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Presign response could not be understood.
    #[error("Invalid presign response: {0}")]
    InvalidResponse(String),

    /// PUT to the presigned URL answered with a non-success status.
    #[error("Upload failed with HTTP {status}: {body}")]
    UploadFailed { status: u16, body: String },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Map a transport error from the HTTP client.
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::ConnectionFailed(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }

    /// Returns true if retrying the same upload later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectionFailed(_) | Self::UploadFailed { .. }
        ) || matches!(self, Self::PresignFailed { status, .. } if *status >= 500)
    }
}
