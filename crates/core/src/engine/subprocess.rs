//! Engine adapter that runs the translation engine as a child process.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::TranslationEngine;
use super::types::{EngineEvent, EngineEventStream, TranslationJob};

/// Name of the job description written into the output directory.
pub const JOB_FILE_NAME: &str = "job.json";

/// Environment variables carrying the resolved service credentials.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV: &str = "OPENAI_MODEL";

/// Runs the configured engine command once per job.
///
/// The child receives the job file path as its last argument and prints one
/// JSON [`EngineEvent`] per stdout line. It is killed when the event stream is
/// dropped.
pub struct SubprocessEngine {
    config: EngineConfig,
}

impl SubprocessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, job: &TranslationJob, job_path: &std::path::Path) -> Command {
        let service = &job.settings.service;

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .arg(job_path)
            .current_dir(&job.output_dir)
            .envs(&self.config.env)
            .env(BASE_URL_ENV, &service.base_url)
            .env(MODEL_ENV, &service.model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = &service.api_key {
            command.env(API_KEY_ENV, key);
        }
        command
    }
}

#[async_trait]
impl TranslationEngine for SubprocessEngine {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn translate(&self, job: TranslationJob) -> Result<EngineEventStream, EngineError> {
        if tokio::fs::metadata(&job.input_path).await.is_err() {
            return Err(EngineError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        tokio::fs::create_dir_all(&job.output_dir).await?;
        let job_path = job.output_dir.join(JOB_FILE_NAME);
        tokio::fs::write(&job_path, serde_json::to_vec_pretty(&job)?).await?;

        let mut child = self.build_command(&job, &job_path).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound {
                    path: self.config.command.clone().into(),
                }
            } else {
                EngineError::Io(e)
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::process_failed("engine stdout was not captured", None))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::process_failed("engine stderr was not captured", None))?;

        info!(
            task_id = %job.task_id,
            command = %self.config.command,
            pid = child.id().unwrap_or_default(),
            "Started translation engine"
        );

        let reader = EventReader {
            task_id: job.task_id.clone(),
            lines: BufReader::new(stdout).lines(),
            child,
            stderr: Some(tokio::spawn(collect_stderr(
                job.task_id,
                stderr,
                self.config.stderr_limit_bytes,
            ))),
            done: false,
        };

        Ok(Box::pin(futures::stream::unfold(reader, next_event)))
    }
}

struct EventReader {
    task_id: String,
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    done: bool,
}

impl EventReader {
    async fn take_stderr(&mut self) -> Option<String> {
        let handle = self.stderr.take()?;
        handle.await.ok().filter(|s| !s.trim().is_empty())
    }
}

async fn next_event(
    mut reader: EventReader,
) -> Option<(Result<EngineEvent, EngineError>, EventReader)> {
    if reader.done {
        return None;
    }

    loop {
        match reader.lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<EngineEvent>(line) {
                    Ok(event) => {
                        reader.done = event.is_terminal();
                        return Some((Ok(event), reader));
                    }
                    Err(e) => {
                        debug!(task_id = %reader.task_id, error = %e, line = %line, "Skipping non-event output");
                    }
                }
            }
            Ok(None) => {
                reader.done = true;
                let status = match reader.child.wait().await {
                    Ok(status) => status,
                    Err(e) => return Some((Err(EngineError::Io(e)), reader)),
                };
                if status.success() {
                    // The consumer reports a missing terminal event itself.
                    return None;
                }
                let stderr = reader.take_stderr().await;
                warn!(task_id = %reader.task_id, %status, "Engine exited unsuccessfully");
                let err = EngineError::process_failed(
                    format!("engine exited with code: {:?}", status.code()),
                    stderr,
                );
                return Some((Err(err), reader));
            }
            Err(e) => {
                reader.done = true;
                return Some((Err(EngineError::Io(e)), reader));
            }
        }
    }
}

/// Drain stderr, keeping the last `limit` bytes.
async fn collect_stderr(task_id: String, stderr: ChildStderr, limit: usize) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut output = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        debug!(task_id = %task_id, "engine: {}", line);
        output.push_str(&line);
        output.push('\n');

        if output.len() > limit {
            let excess = output.len() - limit;
            let cut = (excess..=output.len())
                .find(|i| output.is_char_boundary(*i))
                .unwrap_or(output.len());
            output.drain(..cut);
        }
    }

    output
}
