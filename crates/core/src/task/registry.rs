//! In-memory registry of task snapshots.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock as StdRwLock};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{ArtifactKind, Task, TaskCounts, TaskUpdate};
use crate::storage::StorageCacheEntry;

/// Errors returned by the task registry.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already exists: {0}")]
    AlreadyExists(String),

    #[error("task workspace error: {0}")]
    Io(#[from] io::Error),
}

/// Change notification emitted by the registry.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Updated(Task),
    Removed { task_id: String },
}

/// Callback invoked for every applied change.
///
/// Runs while the registry's write lock is held, so events arrive in write
/// order. It must not call back into the registry.
pub type TaskListener = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

/// Single source of truth for task status.
///
/// Every task also owns a working directory under `tasks_dir`, which is
/// deleted together with the entry.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
    tasks_dir: PathBuf,
    listener: StdRwLock<Option<TaskListener>>,
}

impl TaskRegistry {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            tasks_dir: tasks_dir.into(),
            listener: StdRwLock::new(None),
        }
    }

    /// Install the change listener, replacing any previous one.
    pub fn set_listener(&self, listener: TaskListener) {
        if let Ok(mut guard) = self.listener.write() {
            *guard = Some(listener);
        }
    }

    fn notify(&self, event: TaskEvent) {
        let listener = match self.listener.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        if let Some(listener) = listener {
            listener(&event);
        }
    }

    /// Register a new task in `pending` state.
    pub async fn create(&self, task_id: &str) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(task_id) {
            return Err(TaskError::AlreadyExists(task_id.to_string()));
        }
        let task = Task::pending(task_id);
        tasks.insert(task_id.to_string(), task.clone());
        self.notify(TaskEvent::Updated(task.clone()));
        drop(tasks);

        debug!(task_id = %task_id, "Task registered");
        Ok(task)
    }

    /// Snapshot of the task's latest state.
    pub async fn get(&self, task_id: &str) -> Result<Task, TaskError> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    /// Merge `update` into the task atomically and return the resulting snapshot.
    ///
    /// Updates to a task that already reached a terminal status are dropped and
    /// the frozen snapshot is returned unchanged.
    pub async fn update(&self, task_id: &str, update: TaskUpdate) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        if task.apply(update) {
            let task = task.clone();
            self.notify(TaskEvent::Updated(task.clone()));
            Ok(task)
        } else {
            debug!(task_id = %task_id, status = %task.status, "Ignoring update to finished task");
            Ok(task.clone())
        }
    }

    /// Merge upload outcomes into a completed task's result.
    ///
    /// Uploads finish after the terminal write, so this bypasses the terminal
    /// freeze for `result.storage` only. Tasks in any other status are returned
    /// unchanged.
    pub async fn attach_storage(
        &self,
        task_id: &str,
        storage: BTreeMap<ArtifactKind, StorageCacheEntry>,
    ) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        if task.attach_storage(storage) {
            let task = task.clone();
            self.notify(TaskEvent::Updated(task.clone()));
            Ok(task)
        } else {
            debug!(task_id = %task_id, status = %task.status, "No storage attached");
            Ok(task.clone())
        }
    }

    /// Delete the task and its working directory. Returns whether an entry existed.
    pub async fn remove(&self, task_id: &str) -> bool {
        {
            let mut tasks = self.tasks.write().await;
            // Ids of unknown tasks come from clients and never name a directory.
            if tasks.remove(task_id).is_none() {
                return false;
            }
            self.notify(TaskEvent::Removed {
                task_id: task_id.to_string(),
            });
        }

        let dir = self.workspace(task_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(task_id = %task_id, path = %dir.display(), "Removed task workspace"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                task_id = %task_id,
                path = %dir.display(),
                error = %e,
                "Failed to remove task workspace"
            ),
        }
        true
    }

    /// Path of the task's working directory (not necessarily created yet).
    pub fn workspace(&self, task_id: &str) -> PathBuf {
        self.tasks_dir.join(task_id)
    }

    /// Create the task's working directory and return it.
    pub async fn create_workspace(&self, task_id: &str) -> Result<PathBuf, TaskError> {
        let dir = self.workspace(task_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn contains(&self, task_id: &str) -> bool {
        self.tasks.read().await.contains_key(task_id)
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Number of tasks in each status.
    pub async fn counts(&self) -> TaskCounts {
        let tasks = self.tasks.read().await;
        let mut counts = TaskCounts::default();
        for task in tasks.values() {
            counts.increment(task.status);
        }
        counts
    }
}
