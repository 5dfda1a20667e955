//! Engine events, jobs and output layout policy.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;

use super::error::EngineError;
use crate::job::JobSettings;

/// Ordered, finite stream of engine events.
pub type EngineEventStream = Pin<Box<dyn Stream<Item = Result<EngineEvent, EngineError>> + Send>>;

/// One event emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ProgressStart(ProgressReport),
    ProgressUpdate(ProgressReport),
    ProgressEnd(ProgressReport),
    Finish { translate_result: TranslateResult },
    Error {
        #[serde(default = "default_error_message")]
        error: String,
    },
}

fn default_error_message() -> String {
    "Unknown error".to_string()
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::ProgressStart(_) => "progress_start",
            EngineEvent::ProgressUpdate(_) => "progress_update",
            EngineEvent::ProgressEnd(_) => "progress_end",
            EngineEvent::Finish { .. } => "finish",
            EngineEvent::Error { .. } => "error",
        }
    }

    /// Whether the engine stops after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Finish { .. } | EngineEvent::Error { .. })
    }

    pub fn progress(&self) -> Option<&ProgressReport> {
        match self {
            EngineEvent::ProgressStart(report)
            | EngineEvent::ProgressUpdate(report)
            | EngineEvent::ProgressEnd(report) => Some(report),
            _ => None,
        }
    }

    pub fn update(report: ProgressReport) -> Self {
        EngineEvent::ProgressUpdate(report)
    }

    pub fn finish(result: TranslateResult) -> Self {
        EngineEvent::Finish {
            translate_result: result,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        EngineEvent::Error {
            error: message.into(),
        }
    }
}

/// Progress payload. Absent fields keep the task's previous value, except the
/// part and stage counters which read as 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgressReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_parts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_total: Option<u64>,
}

impl ProgressReport {
    pub fn new(overall_progress: f64, stage: impl Into<String>) -> Self {
        Self {
            overall_progress: Some(overall_progress),
            stage: Some(stage.into()),
            ..Self::default()
        }
    }

    pub fn with_parts(mut self, part_index: u32, total_parts: u32) -> Self {
        self.part_index = Some(part_index);
        self.total_parts = Some(total_parts);
        self
    }

    pub fn with_stage_counters(mut self, current: u64, total: u64) -> Self {
        self.stage_current = Some(current);
        self.stage_total = Some(total);
        self
    }

    /// Overall progress as a whole percentage, clamped to 0-100.
    pub fn percent(&self) -> Option<u8> {
        self.overall_progress
            .filter(|p| p.is_finite())
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
    }
}

/// Engine output for a finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TranslateResult {
    #[serde(default)]
    pub mono_pdf_path: Option<PathBuf>,
    #[serde(default)]
    pub dual_pdf_path: Option<PathBuf>,
    #[serde(default)]
    pub total_seconds: f64,
}

/// Which page sits on which side of a side-by-side dual page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DualPageOrder {
    /// Original on the left, translation on the right.
    #[default]
    OriginalFirst,
    /// Translation on the left, original on the right.
    TranslatedFirst,
}

/// A half of a dual page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageSide {
    Original,
    Translated,
}

impl DualPageOrder {
    /// `(left, right)` contents.
    pub fn sides(&self) -> (PageSide, PageSide) {
        match self {
            DualPageOrder::OriginalFirst => (PageSide::Original, PageSide::Translated),
            DualPageOrder::TranslatedFirst => (PageSide::Translated, PageSide::Original),
        }
    }
}

/// Layout of the dual output document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DualLayout {
    pub order: DualPageOrder,
    /// Interleave whole pages instead of placing them side by side.
    pub alternating_pages: bool,
}

/// Everything the engine needs to translate one document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TranslationJob {
    pub task_id: String,
    pub input_path: PathBuf,
    /// Directory the engine writes its outputs into.
    pub output_dir: PathBuf,
    pub settings: JobSettings,
}
