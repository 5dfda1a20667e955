//! Wire and cache types for the upload client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Remote copy of an uploaded artifact, keyed by its SHA-256 digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageCacheEntry {
    /// Hex SHA-256 of the uploaded bytes.
    pub file_hash: String,
    pub storage_key: String,
    pub access_url: String,
    /// Unix seconds after which `access_url` stops working.
    pub access_expires_at: i64,
    pub upload_time: DateTime<Utc>,
}

/// Request body for the presign endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PresignRequest<'a> {
    pub filename: &'a str,
}

/// Presigned upload slot handed out by the storage API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresignedUpload {
    /// URL the bytes are PUT to.
    pub presigned_url: String,
    /// Object key in the bucket.
    pub key: String,
    /// Unix seconds after which `presigned_url` stops accepting uploads.
    pub expires_at: i64,
    /// Download URL for the stored object.
    pub access_url: String,
    /// Unix seconds after which `access_url` stops working.
    pub access_expires_at: i64,
}

/// Presign response, either wrapped in the `{code, msg, data}` envelope or bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PresignReply {
    Envelope {
        code: i64,
        #[serde(default)]
        msg: Option<String>,
        #[serde(default)]
        data: Option<PresignedUpload>,
    },
    Bare(PresignedUpload),
}

impl PresignReply {
    pub fn into_upload(self) -> Result<PresignedUpload, StorageError> {
        match self {
            PresignReply::Bare(upload) => Ok(upload),
            PresignReply::Envelope { code, msg, data } => {
                if code != 0 {
                    return Err(StorageError::Api {
                        code,
                        message: msg.unwrap_or_else(|| "unknown error".to_string()),
                    });
                }
                data.ok_or_else(|| {
                    StorageError::InvalidResponse("envelope without data".to_string())
                })
            }
        }
    }
}
