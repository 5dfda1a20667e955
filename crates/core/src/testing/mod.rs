//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the translation engine and the object store, so the
//! whole task lifecycle can be exercised without external processes or
//! network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfxlate_core::testing::{MockEngine, MockStorageBackend, ScriptStep};
//!
//! let engine = MockEngine::with_script(vec![ScriptStep::error("engine crashed")]);
//! let storage = MockStorageBackend::new();
//! storage.fail_next_put(403).await;
//! ```

mod mock_engine;
mod mock_storage;

pub use mock_engine::{MockEngine, ScriptStep};
pub use mock_storage::MockStorageBackend;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::{JobConfig, JobSettings, ServiceCatalog};

    /// Bytes that pass the PDF signature check.
    pub fn pdf_bytes(label: &str) -> Vec<u8> {
        format!("%PDF-1.4\n% {}\n%%EOF\n", label).into_bytes()
    }

    /// A catalog with no credentials configured.
    pub fn empty_catalog() -> ServiceCatalog {
        ServiceCatalog::from_lookup(|_| None)
    }

    /// Settings resolved from the default job options.
    pub fn job_settings() -> JobSettings {
        match JobConfig::default().resolve(&empty_catalog()) {
            Ok(settings) => settings,
            Err(e) => panic!("default job options must resolve: {}", e),
        }
    }
}
