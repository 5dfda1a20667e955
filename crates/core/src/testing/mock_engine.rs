//! Mock translation engine for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{
    EngineError, EngineEvent, EngineEventStream, ProgressReport, TranslateResult,
    TranslationEngine, TranslationJob,
};

/// One step of a scripted engine run.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield an event.
    Emit(EngineEvent),
    /// Yield a stream error.
    Fail(String),
    /// Wait before the next step.
    Sleep(Duration),
    /// Occupy the worker thread without yielding.
    Block(Duration),
    /// Never yield again.
    Hang,
    /// Panic while the stream is polled.
    Panic(String),
}

impl ScriptStep {
    pub fn progress(overall_progress: f64, stage: &str) -> Self {
        ScriptStep::Emit(EngineEvent::update(ProgressReport::new(
            overall_progress,
            stage,
        )))
    }

    /// Finish with `mono.pdf` and `dual.pdf` relative to the output directory.
    pub fn finish(total_seconds: f64) -> Self {
        ScriptStep::Emit(EngineEvent::finish(TranslateResult {
            mono_pdf_path: Some(PathBuf::from("mono.pdf")),
            dual_pdf_path: Some(PathBuf::from("dual.pdf")),
            total_seconds,
        }))
    }

    pub fn error(message: &str) -> Self {
        ScriptStep::Emit(EngineEvent::error(message))
    }

    pub fn sleep_ms(ms: u64) -> Self {
        ScriptStep::Sleep(Duration::from_millis(ms))
    }
}

/// Mock implementation of [`TranslationEngine`].
///
/// Plays back a script of [`ScriptStep`]s for every job. When it emits a
/// `finish` event, relative artifact paths are written as small PDFs into the
/// job's output directory so the result can be downloaded and uploaded.
///
/// # Example
///
/// ```rust,ignore
/// use pdfxlate_core::testing::{MockEngine, ScriptStep};
///
/// let engine = MockEngine::with_script(vec![
///     ScriptStep::progress(42.0, "Rendering"),
///     ScriptStep::finish(3.5),
/// ]);
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    script: Arc<RwLock<Vec<ScriptStep>>>,
    start_error: Arc<RwLock<Option<String>>>,
    jobs: Arc<RwLock<Vec<TranslationJob>>>,
    dropped_streams: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// An engine that finishes immediately.
    pub fn new() -> Self {
        Self::with_script(vec![ScriptStep::finish(1.0)])
    }

    pub fn with_script(script: Vec<ScriptStep>) -> Self {
        Self {
            script: Arc::new(RwLock::new(script)),
            start_error: Arc::new(RwLock::new(None)),
            jobs: Arc::new(RwLock::new(Vec::new())),
            dropped_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the script used by later jobs.
    pub async fn set_script(&self, script: Vec<ScriptStep>) {
        *self.script.write().await = script;
    }

    /// Make every later `translate` call fail before producing a stream.
    pub async fn fail_to_start(&self, reason: &str) {
        *self.start_error.write().await = Some(reason.to_string());
    }

    /// Jobs received, in call order.
    pub async fn jobs(&self) -> Vec<TranslationJob> {
        self.jobs.read().await.clone()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Number of event streams that have been dropped.
    pub fn dropped_streams(&self) -> usize {
        self.dropped_streams.load(Ordering::SeqCst)
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Playback {
    steps: VecDeque<ScriptStep>,
    output_dir: PathBuf,
    _counter: DropCounter,
}

async fn write_artifacts(output_dir: &Path, result: &TranslateResult) {
    for path in [&result.mono_pdf_path, &result.dual_pdf_path]
        .into_iter()
        .flatten()
        .filter(|p| p.is_relative())
    {
        let target = output_dir.join(path);
        let body = format!("%PDF-1.7\n% mock output {}\n", path.display());
        if let Err(e) = tokio::fs::write(&target, body).await {
            tracing::warn!(path = %target.display(), error = %e, "Mock engine could not write artifact");
        }
    }
}

async fn next_step(
    mut playback: Playback,
) -> Option<(Result<EngineEvent, EngineError>, Playback)> {
    loop {
        match playback.steps.pop_front()? {
            ScriptStep::Emit(event) => {
                if let EngineEvent::Finish { translate_result } = &event {
                    write_artifacts(&playback.output_dir, translate_result).await;
                }
                return Some((Ok(event), playback));
            }
            ScriptStep::Fail(reason) => {
                return Some((Err(EngineError::process_failed(reason, None)), playback));
            }
            ScriptStep::Sleep(delay) => tokio::time::sleep(delay).await,
            ScriptStep::Block(duration) => std::thread::sleep(duration),
            ScriptStep::Hang => std::future::pending::<()>().await,
            ScriptStep::Panic(message) => panic!("{}", message),
        }
    }
}

#[async_trait]
impl TranslationEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate(&self, job: TranslationJob) -> Result<EngineEventStream, EngineError> {
        self.jobs.write().await.push(job.clone());

        if let Some(reason) = self.start_error.read().await.clone() {
            return Err(EngineError::process_failed(reason, None));
        }

        let playback = Playback {
            steps: self.script.read().await.iter().cloned().collect(),
            output_dir: job.output_dir,
            _counter: DropCounter(Arc::clone(&self.dropped_streams)),
        };
        Ok(Box::pin(futures::stream::unfold(playback, next_step)))
    }
}
