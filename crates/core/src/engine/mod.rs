//! Adapter boundary to the external translation engine.

mod config;
mod error;
mod subprocess;
mod traits;
mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use subprocess::{SubprocessEngine, API_KEY_ENV, BASE_URL_ENV, JOB_FILE_NAME, MODEL_ENV};
pub use traits::TranslationEngine;
pub use types::{
    DualLayout, DualPageOrder, EngineEvent, EngineEventStream, PageSide, ProgressReport,
    TranslateResult, TranslationJob,
};
