//! Uploaded input files addressed by opaque ids.

mod error;
mod registry;

pub use error::FileError;
pub use registry::{sanitize_filename, validate_pdf, FileRegistry, UploadedFile, PDF_MAGIC};
