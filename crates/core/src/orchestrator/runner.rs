//! Task orchestrator implementation.
//!
//! Every accepted task runs as one spawned tokio task:
//! - the engine stream is consumed event by event and mirrored into the registry
//! - a watch channel carries cancel requests, observed with a biased `select!`
//! - the terminal status is written once; artifact uploads run after it and
//!   only add `result.storage` to the completed snapshot

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{EngineEvent, ProgressReport, TranslateResult, TranslationEngine, TranslationJob};
use crate::job::JobSettings;
use crate::metrics;
use crate::storage::ArtifactUploader;
use crate::task::{Task, TaskRegistry, TaskResult, TaskStatus, TaskUpdate};

use super::config::OrchestratorConfig;
use super::types::{ActiveTaskInfo, OrchestratorError, OrchestratorStatus};

/// Error recorded when a cancel request wins.
pub const CANCELLED_MESSAGE: &str = "Translation was cancelled";

/// Error recorded when the engine stream ends without finish or error.
pub const NO_RESULT_MESSAGE: &str = "Engine stream ended without a result";

struct ActiveTask {
    cancel_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    started_at: DateTime<Utc>,
}

type ActiveSet = Arc<Mutex<HashMap<String, ActiveTask>>>;

fn lock(active: &ActiveSet) -> MutexGuard<'_, HashMap<String, ActiveTask>> {
    match active.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Removes the task from the active set when the background unit ends,
/// whether it returns, panics or is aborted.
struct ActiveGuard {
    task_id: String,
    active: ActiveSet,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.task_id);
        debug!(task_id = %self.task_id, "Task left active set");
    }
}

/// Runs translation tasks in the background and records their progress.
pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<TaskRegistry>,
    engine: Arc<dyn TranslationEngine>,
    uploader: Arc<dyn ArtifactUploader>,
    active: ActiveSet,
    accepting: AtomicBool,
}

impl TaskOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<TaskRegistry>,
        engine: Arc<dyn TranslationEngine>,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> Self {
        Self {
            config,
            registry,
            engine,
            uploader,
            active: Arc::new(Mutex::new(HashMap::new())),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Register a task for `input_path` and start it in the background.
    ///
    /// Returns the new task id immediately; the task is `pending` until the
    /// background unit picks it up.
    pub async fn start(
        &self,
        input_path: PathBuf,
        settings: JobSettings,
    ) -> Result<String, OrchestratorError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(OrchestratorError::ShuttingDown);
        }

        let task_id = Uuid::new_v4().to_string();
        self.registry.create(&task_id).await?;
        let output_dir = match self.registry.create_workspace(&task_id).await {
            Ok(dir) => dir,
            Err(e) => {
                self.registry.remove(&task_id).await;
                return Err(e.into());
            }
        };

        let job = TranslationJob {
            task_id: task_id.clone(),
            input_path,
            output_dir,
            settings,
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        lock(&self.active).insert(
            task_id.clone(),
            ActiveTask {
                cancel_tx,
                handle: None,
                started_at: Utc::now(),
            },
        );

        let unit = TaskUnit {
            task_id: task_id.clone(),
            registry: Arc::clone(&self.registry),
            engine: Arc::clone(&self.engine),
            uploader: Arc::clone(&self.uploader),
            timeout: self.task_timeout(),
        };
        let guard = ActiveGuard {
            task_id: task_id.clone(),
            active: Arc::clone(&self.active),
        };
        let handle = tokio::spawn(unit.run(job, cancel_rx, guard));

        // The unit may already have finished and deregistered itself.
        if let Some(entry) = lock(&self.active).get_mut(&task_id) {
            entry.handle = Some(handle);
        }

        metrics::TASKS_STARTED.inc();
        info!(task_id = %task_id, engine = self.engine.name(), "Task started");
        Ok(task_id)
    }

    /// Request cancellation and return the task's resulting snapshot.
    ///
    /// Cancelling a task that already finished changes nothing and is not an
    /// error.
    pub async fn cancel(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        // A completed unit may still be uploading artifacts; leave it alone.
        let task = self.registry.get(task_id).await?;
        if task.status.is_terminal() {
            debug!(task_id = %task_id, status = %task.status, "Cancel of finished task ignored");
            return Ok(task);
        }

        let entry = {
            let mut active = lock(&self.active);
            active.get_mut(task_id).map(|entry| {
                let _ = entry.cancel_tx.send(true);
                entry.handle.take()
            })
        };

        let Some(handle) = entry else {
            return Ok(self.registry.update(task_id, cancelled_update()).await?);
        };

        info!(task_id = %task_id, "Cancelling task");
        if let Some(mut handle) = handle {
            let grace = Duration::from_millis(self.config.cancel_grace_ms);
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                let finished = self
                    .registry
                    .get(task_id)
                    .await
                    .map(|task| task.status.is_terminal())
                    .unwrap_or(false);
                if finished {
                    debug!(task_id = %task_id, "Task finished during cancel, uploads left running");
                    return Ok(self.registry.get(task_id).await?);
                }
                warn!(
                    task_id = %task_id,
                    grace_ms = self.config.cancel_grace_ms,
                    "Task did not stop in time, aborting"
                );
                handle.abort();
                let _ = handle.await;
            }
        }

        // No-op when the unit already recorded its own terminal status.
        Ok(self.registry.update(task_id, cancelled_update()).await?)
    }

    /// Cancel the task if it is running, then delete it and its working
    /// directory. Returns whether a registry entry existed.
    pub async fn release(&self, task_id: &str) -> bool {
        if self.is_active(task_id) {
            if let Err(e) = self.cancel(task_id).await {
                warn!(task_id = %task_id, error = %e, "Cancel before release failed");
            }
        }
        let existed = self.registry.remove(task_id).await;
        if existed {
            info!(task_id = %task_id, "Task released");
        }
        existed
    }

    /// Stop accepting tasks and cancel everything still running.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);

        let ids: Vec<String> = lock(&self.active).keys().cloned().collect();
        if ids.is_empty() {
            return;
        }
        info!(count = ids.len(), "Cancelling active tasks for shutdown");

        let results = futures::future::join_all(ids.iter().map(|id| self.cancel(id))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                warn!(task_id = %id, error = %e, "Failed to cancel task during shutdown");
            }
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn is_active(&self, task_id: &str) -> bool {
        lock(&self.active).contains_key(task_id)
    }

    pub fn active_tasks(&self) -> Vec<ActiveTaskInfo> {
        let mut tasks: Vec<ActiveTaskInfo> = lock(&self.active)
            .iter()
            .map(|(id, entry)| ActiveTaskInfo {
                task_id: id.clone(),
                started_at: entry.started_at,
            })
            .collect();
        tasks.sort_by_key(|t| t.started_at);
        tasks
    }

    pub async fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            accepting: self.is_accepting(),
            active_tasks: self.active_count(),
            tasks: self.registry.counts().await,
        }
    }

    fn task_timeout(&self) -> Option<Duration> {
        match self.config.task_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn cancelled_update() -> TaskUpdate {
    TaskUpdate::new()
        .with_status(TaskStatus::Cancelled)
        .with_error(CANCELLED_MESSAGE)
}

fn failed_update(message: impl Into<String>) -> TaskUpdate {
    TaskUpdate::new()
        .with_status(TaskStatus::Error)
        .with_error(message)
}

fn progress_update(report: &ProgressReport) -> TaskUpdate {
    let mut update = TaskUpdate::new()
        .with_status(TaskStatus::Running)
        .with_parts(
            report.part_index.unwrap_or(1),
            report.total_parts.unwrap_or(1),
        )
        .with_stage_counters(
            report.stage_current.unwrap_or(1),
            report.stage_total.unwrap_or(1),
        );
    if let Some(progress) = report.percent() {
        update = update.with_progress(progress);
    }
    if let Some(stage) = &report.stage {
        update = update.with_stage(stage.clone());
    }
    update
}

/// Terminal update for a finished engine run. Relative artifact paths are
/// resolved against the job's output directory.
fn completed_update(result: TranslateResult, output_dir: &Path) -> TaskUpdate {
    let resolve = |path: Option<PathBuf>| {
        path.map(|p| if p.is_absolute() { p } else { output_dir.join(p) })
    };
    TaskUpdate::new()
        .with_status(TaskStatus::Completed)
        .with_progress(100)
        .with_stage("Translation complete")
        .with_result(TaskResult {
            mono_pdf_path: resolve(result.mono_pdf_path),
            dual_pdf_path: resolve(result.dual_pdf_path),
            total_seconds: result.total_seconds,
            storage: BTreeMap::new(),
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Resolves when a cancel is requested. Never resolves if the sender is gone.
async fn cancel_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// The background half of one task.
struct TaskUnit {
    task_id: String,
    registry: Arc<TaskRegistry>,
    engine: Arc<dyn TranslationEngine>,
    uploader: Arc<dyn ArtifactUploader>,
    timeout: Option<Duration>,
}

impl TaskUnit {
    async fn run(self, job: TranslationJob, mut cancel_rx: watch::Receiver<bool>, _guard: ActiveGuard) {
        let started = Instant::now();

        self.write(
            TaskUpdate::new()
                .with_status(TaskStatus::Running)
                .with_progress(0)
                .with_stage("Initializing"),
        )
        .await;

        let update = tokio::select! {
            biased;
            _ = cancel_requested(&mut cancel_rx) => {
                info!(task_id = %self.task_id, "Cancel observed, stopping engine");
                cancelled_update()
            }
            update = self.drive(job) => update,
        };

        let task = self.write(update).await;
        let elapsed = started.elapsed().as_secs_f64();

        if let Some(task) = task {
            let outcome = task.status.as_str();
            metrics::TASKS_FINISHED.with_label_values(&[outcome]).inc();
            metrics::TASK_DURATION
                .with_label_values(&[outcome])
                .observe(elapsed);

            match task.status {
                TaskStatus::Completed => info!(
                    task_id = %self.task_id,
                    elapsed_secs = elapsed,
                    "Task completed"
                ),
                TaskStatus::Error => warn!(
                    task_id = %self.task_id,
                    error = task.error.as_deref().unwrap_or_default(),
                    "Task failed"
                ),
                _ => info!(task_id = %self.task_id, status = %task.status, "Task finished"),
            }

            if task.status == TaskStatus::Completed {
                self.publish(&task).await;
            }
        }
    }

    /// Upload the artifacts of a completed task and merge the outcomes into
    /// its result. Cancel requests and the task time limit no longer apply.
    async fn publish(&self, task: &Task) {
        if !self.uploader.is_enabled() {
            return;
        }
        let Some(result) = &task.result else {
            return;
        };

        let mut storage = BTreeMap::new();
        for (kind, path) in result.artifacts() {
            match self.uploader.upload(path).await {
                Ok(Some(entry)) => {
                    storage.insert(kind, entry);
                }
                Ok(None) => {}
                Err(e) => warn!(
                    task_id = %self.task_id,
                    artifact = %kind,
                    path = %path.display(),
                    error = %e,
                    "Artifact upload failed"
                ),
            }
        }
        if storage.is_empty() {
            return;
        }

        let uploaded = storage.len();
        match self.registry.attach_storage(&self.task_id, storage).await {
            Ok(_) => info!(task_id = %self.task_id, uploaded, "Artifacts uploaded"),
            Err(e) => debug!(task_id = %self.task_id, error = %e, "Task released before uploads finished"),
        }
    }

    /// Apply an update, logging instead of failing when the task is gone.
    async fn write(&self, update: TaskUpdate) -> Option<Task> {
        match self.registry.update(&self.task_id, update).await {
            Ok(task) => Some(task),
            Err(e) => {
                debug!(task_id = %self.task_id, error = %e, "Task no longer registered");
                None
            }
        }
    }

    /// Consume the engine under the optional time limit, turning panics into
    /// an error update.
    async fn drive(&self, job: TranslationJob) -> TaskUpdate {
        let consume = AssertUnwindSafe(self.consume(job)).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, consume).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return failed_update(format!(
                        "Translation timed out after {} seconds",
                        limit.as_secs()
                    ))
                }
            },
            None => consume.await,
        };

        match outcome {
            Ok(update) => update,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(task_id = %self.task_id, panic = %message, "Translation task panicked");
                failed_update(format!("Translation task panicked: {}", message))
            }
        }
    }

    async fn consume(&self, job: TranslationJob) -> TaskUpdate {
        let output_dir = job.output_dir.clone();

        let mut stream = match self.engine.translate(job).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "Engine failed to start");
                return failed_update(e.task_message());
            }
        };

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    warn!(task_id = %self.task_id, error = %e, "Engine stream failed");
                    return failed_update(e.task_message());
                }
            };
            metrics::ENGINE_EVENTS
                .with_label_values(&[event.kind()])
                .inc();

            match event {
                EngineEvent::Finish { translate_result } => {
                    return completed_update(translate_result, &output_dir);
                }
                EngineEvent::Error { error } => return failed_update(error),
                event => {
                    if let Some(report) = event.progress() {
                        self.write(progress_update(report)).await;
                    }
                }
            }
        }

        failed_update(NO_RESULT_MESSAGE)
    }
}
