//! Content-hash upload client for finished artifacts.
//!
//! Artifacts are hashed, and bytes already stored under the same digest are
//! never sent again. New content goes through a two-step presign-then-PUT
//! exchange with the storage API.

mod backend;
mod config;
mod error;
mod types;
mod uploader;

pub use backend::{HttpStorageBackend, StorageBackend};
pub use config::StorageConfig;
pub use error::StorageError;
pub use types::{PresignReply, PresignRequest, PresignedUpload, StorageCacheEntry};
pub use uploader::{
    sha256_file, storage_filename, ArtifactUploader, DedupUploader, HASH_BLOCK_SIZE,
};
