//! Task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::storage::StorageCacheEntry;

/// Lifecycle status of a translation task.
///
/// Transitions only move forward: `pending -> running -> {completed | error | cancelled}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Error,
        TaskStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Cancelled => 2,
        }
    }

    /// Whether moving from `self` to `next` goes forward in the lifecycle.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output document flavours produced by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Translated text only.
    Mono,
    /// Original and translation together.
    Dual,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Mono, ArtifactKind::Dual];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Mono => "mono",
            ArtifactKind::Dual => "dual",
        }
    }

    /// Attachment name used when the artifact is downloaded.
    pub fn download_filename(&self, task_id: &str) -> String {
        format!("translated_{}_{}.pdf", self.as_str(), task_id)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mono" => Ok(ArtifactKind::Mono),
            "dual" => Ok(ArtifactKind::Dual),
            other => Err(format!("unknown artifact kind '{}'", other)),
        }
    }
}

/// Outcome of a completed task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mono_pdf_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dual_pdf_path: Option<PathBuf>,
    /// Wall-clock seconds reported by the engine.
    pub total_seconds: f64,
    /// Remote copies of uploaded artifacts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<ArtifactKind, StorageCacheEntry>,
}

impl TaskResult {
    pub fn artifact_path(&self, kind: ArtifactKind) -> Option<&Path> {
        match kind {
            ArtifactKind::Mono => self.mono_pdf_path.as_deref(),
            ArtifactKind::Dual => self.dual_pdf_path.as_deref(),
        }
    }

    /// Artifacts the engine actually produced, in a stable order.
    pub fn artifacts(&self) -> Vec<(ArtifactKind, &Path)> {
        ArtifactKind::ALL
            .iter()
            .filter_map(|kind| self.artifact_path(*kind).map(|p| (*kind, p)))
            .collect()
    }
}

/// Snapshot of one task as seen by pollers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    /// Overall progress, 0-100.
    pub progress: u8,
    /// Human-readable name of the current engine stage.
    pub stage: String,
    pub part_index: u32,
    pub total_parts: u32,
    pub stage_current: u64,
    pub stage_total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A freshly registered task that has not started running yet.
    pub fn pending(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            progress: 0,
            stage: "Queued".to_string(),
            part_index: 0,
            total_parts: 0,
            stage_current: 0,
            stage_total: 0,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a partial update. Returns false when the task was already
    /// terminal and nothing changed.
    pub fn apply(&mut self, update: TaskUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        if let Some(status) = update.status {
            if self.status.can_transition_to(status) {
                self.status = status;
            }
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        if let Some(part_index) = update.part_index {
            self.part_index = part_index;
        }
        if let Some(total_parts) = update.total_parts {
            self.total_parts = total_parts;
        }
        if let Some(stage_current) = update.stage_current {
            self.stage_current = stage_current;
        }
        if let Some(stage_total) = update.stage_total {
            self.stage_total = stage_total;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        self.updated_at = Utc::now();
        true
    }

    /// Record upload outcomes on a completed task's result.
    ///
    /// This is the only change a terminal task accepts. Returns false for any
    /// other status, for a task without a result, or when `storage` is empty.
    pub fn attach_storage(&mut self, storage: BTreeMap<ArtifactKind, StorageCacheEntry>) -> bool {
        if self.status != TaskStatus::Completed || storage.is_empty() {
            return false;
        }
        let Some(result) = self.result.as_mut() else {
            return false;
        };
        result.storage.extend(storage);
        self.updated_at = Utc::now();
        true
    }
}

/// Partial update merged into a task. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub stage: Option<String>,
    pub part_index: Option<u32>,
    pub total_parts: Option<u32>,
    pub stage_current: Option<u64>,
    pub stage_total: Option<u64>,
    pub error: Option<String>,
    pub result: Option<TaskResult>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
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

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// Number of tasks in each status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub error: usize,
    pub cancelled: usize,
}

impl TaskCounts {
    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Running => self.running,
            TaskStatus::Completed => self.completed,
            TaskStatus::Error => self.error,
            TaskStatus::Cancelled => self.cancelled,
        }
    }

    pub(crate) fn increment(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Error => self.error += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.error + self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        let parsed: TaskStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(parsed, TaskStatus::Running);
    }

    #[test]
    fn test_status_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Cancelled));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Error));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_apply_merges_fields() {
        let mut task = Task::pending("t1");
        let changed = task.apply(
            TaskUpdate::new()
                .with_status(TaskStatus::Running)
                .with_progress(42)
                .with_stage("Rendering")
                .with_parts(1, 3),
        );
        assert!(changed);
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.progress, 42);
        assert_eq!(task.stage, "Rendering");
        assert_eq!(task.part_index, 1);
        assert_eq!(task.total_parts, 3);
        assert_eq!(task.stage_current, 0);
    }

    #[test]
    fn test_apply_clamps_progress() {
        let mut task = Task::pending("t1");
        task.apply(TaskUpdate::new().with_progress(250));
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_apply_after_terminal_is_ignored() {
        let mut task = Task::pending("t1");
        task.apply(
            TaskUpdate::new()
                .with_status(TaskStatus::Error)
                .with_error("boom"),
        );
        let frozen = task.clone();

        let changed = task.apply(
            TaskUpdate::new()
                .with_status(TaskStatus::Running)
                .with_progress(90)
                .with_stage("late"),
        );
        assert!(!changed);
        assert_eq!(task, frozen);
    }

    #[test]
    fn test_apply_ignores_status_regression() {
        let mut task = Task::pending("t1");
        task.apply(TaskUpdate::new().with_status(TaskStatus::Running));
        task.apply(
            TaskUpdate::new()
                .with_status(TaskStatus::Pending)
                .with_progress(10),
        );
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.progress, 10);
    }

    #[test]
    fn test_artifact_kind_parse() {
        assert_eq!("mono".parse::<ArtifactKind>().unwrap(), ArtifactKind::Mono);
        assert_eq!("dual".parse::<ArtifactKind>().unwrap(), ArtifactKind::Dual);
        assert!("triple".parse::<ArtifactKind>().is_err());
        assert_eq!(
            ArtifactKind::Dual.download_filename("abc"),
            "translated_dual_abc.pdf"
        );
    }

    #[test]
    fn test_result_artifacts() {
        let result = TaskResult {
            mono_pdf_path: None,
            dual_pdf_path: Some(PathBuf::from("/out/doc.dual.pdf")),
            total_seconds: 1.0,
            storage: BTreeMap::new(),
        };
        let artifacts = result.artifacts();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].0, ArtifactKind::Dual);
        assert!(result.artifact_path(ArtifactKind::Mono).is_none());
    }

    fn storage_entry(hash: &str) -> StorageCacheEntry {
        StorageCacheEntry {
            file_hash: hash.to_string(),
            storage_key: format!("uploads/{}.pdf", hash),
            access_url: format!("https://cdn.example.com/{}.pdf", hash),
            access_expires_at: 1_900_000_000,
            upload_time: Utc::now(),
        }
    }

    #[test]
    fn test_attach_storage_only_on_completed_result() {
        let mut task = Task::pending("t1");
        let storage = BTreeMap::from([(ArtifactKind::Mono, storage_entry("aa"))]);
        assert!(!task.attach_storage(storage.clone()));

        task.apply(
            TaskUpdate::new()
                .with_status(TaskStatus::Completed)
                .with_progress(100)
                .with_result(TaskResult {
                    mono_pdf_path: Some(PathBuf::from("/out/doc.mono.pdf")),
                    dual_pdf_path: None,
                    total_seconds: 2.0,
                    storage: BTreeMap::new(),
                }),
        );
        assert!(!task.attach_storage(BTreeMap::new()));
        assert!(task.attach_storage(storage));

        let result = task.result.as_ref().unwrap();
        assert_eq!(result.storage[&ArtifactKind::Mono].file_hash, "aa");
        assert_eq!(result.total_seconds, 2.0);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_attach_storage_ignored_for_failed_task() {
        let mut task = Task::pending("t1");
        task.apply(
            TaskUpdate::new()
                .with_status(TaskStatus::Cancelled)
                .with_error("Translation was cancelled"),
        );
        let frozen = task.clone();
        let storage = BTreeMap::from([(ArtifactKind::Dual, storage_entry("bb"))]);
        assert!(!task.attach_storage(storage));
        assert_eq!(task, frozen);
    }

    #[test]
    fn test_task_serialization_skips_empty() {
        let task = Task::pending("t1");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["progress"], 0);
        assert!(json.get("error").is_none());
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_counts() {
        let mut counts = TaskCounts::default();
        counts.increment(TaskStatus::Running);
        counts.increment(TaskStatus::Completed);
        counts.increment(TaskStatus::Completed);
        assert_eq!(counts.get(TaskStatus::Completed), 2);
        assert_eq!(counts.total(), 3);
    }
}
