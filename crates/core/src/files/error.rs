//! Error types for the file registry.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when registering or resolving uploaded files.
#[derive(Debug, Error)]
pub enum FileError {
    /// Upload carried no bytes.
    #[error("Uploaded file is empty")]
    Empty,

    /// Upload exceeds the configured size limit.
    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// Content does not start with a PDF header.
    #[error("File is not a PDF (missing %PDF- header)")]
    NotPdf,

    /// Unknown id, or the backing file has disappeared.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Failed to persist the upload.
    #[error("Failed to write uploaded file to {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    /// Whether the error was caused by the request content rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, FileError::WriteFailed { .. })
    }
}
