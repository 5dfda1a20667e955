//! Trait definitions for the engine adapter.

use async_trait::async_trait;

use super::error::EngineError;
use super::types::{EngineEventStream, TranslationJob};

/// An external engine that translates one document and streams its progress.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Start translating `job`.
    ///
    /// The returned stream yields events in order and ends after a terminal
    /// `finish` or `error` event. Dropping the stream stops the engine.
    async fn translate(&self, job: TranslationJob) -> Result<EngineEventStream, EngineError>;
}
