//! Registry of uploaded input PDFs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::FileError;

/// Magic bytes every accepted upload must start with.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

const FALLBACK_FILENAME: &str = "document.pdf";

/// An uploaded input document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub id: String,
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Maps opaque file ids to PDFs persisted under `files_dir/<id>/`.
pub struct FileRegistry {
    files: RwLock<HashMap<String, UploadedFile>>,
    files_dir: PathBuf,
    max_size: u64,
}

impl FileRegistry {
    pub fn new(files_dir: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            files_dir: files_dir.into(),
            max_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Validate and persist an upload, returning its record.
    pub async fn register(&self, bytes: &[u8], filename: &str) -> Result<UploadedFile, FileError> {
        validate_pdf(bytes, self.max_size)?;

        let id = uuid::Uuid::new_v4().to_string();
        let filename = sanitize_filename(filename);
        let dir = self.files_dir.join(&id);
        let path = dir.join(&filename);

        fs::create_dir_all(&dir)
            .await
            .map_err(|source| FileError::WriteFailed {
                path: dir.clone(),
                source,
            })?;
        fs::write(&path, bytes)
            .await
            .map_err(|source| FileError::WriteFailed {
                path: path.clone(),
                source,
            })?;

        let path = fs::canonicalize(&path).await.unwrap_or(path);
        let record = UploadedFile {
            id: id.clone(),
            path,
            filename,
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };

        self.files.write().await.insert(id.clone(), record.clone());
        info!(file_id = %id, filename = %record.filename, size = record.size, "Registered upload");

        Ok(record)
    }

    /// Full record for a file id.
    pub async fn get(&self, file_id: &str) -> Result<UploadedFile, FileError> {
        let record = self
            .files
            .read()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| FileError::NotFound(file_id.to_string()))?;

        if fs::metadata(&record.path).await.is_err() {
            warn!(file_id = %file_id, path = %record.path.display(), "Backing file disappeared");
            self.files.write().await.remove(file_id);
            return Err(FileError::NotFound(file_id.to_string()));
        }

        Ok(record)
    }

    /// Absolute path of a registered file.
    pub async fn resolve(&self, file_id: &str) -> Result<PathBuf, FileError> {
        self.get(file_id).await.map(|record| record.path)
    }

    /// Forget a file and delete its directory. Returns whether an entry existed.
    pub async fn release(&self, file_id: &str) -> bool {
        let removed = self.files.write().await.remove(file_id);
        let dir = self.files_dir.join(file_id);

        // Never let an id escape files_dir.
        if file_id.is_empty() || file_id.contains(['/', '\\']) || file_id.contains("..") {
            return removed.is_some();
        }

        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(file_id = %file_id, "Removed upload directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(file_id = %file_id, error = %e, "Failed to remove upload directory"),
        }

        removed.is_some()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

/// Reject empty, oversized and non-PDF content.
pub fn validate_pdf(bytes: &[u8], max_size: u64) -> Result<(), FileError> {
    if bytes.is_empty() {
        return Err(FileError::Empty);
    }
    let size = bytes.len() as u64;
    if size > max_size {
        return Err(FileError::TooLarge {
            size,
            limit: max_size,
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(FileError::NotPdf);
    }
    Ok(())
}

/// Keep only the final path component of a client-supplied name.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        name.to_string()
    }
}
