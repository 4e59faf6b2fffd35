use std::{path::Path, process::Stdio};

use async_trait::async_trait;
use intone_config::{CommandEngineConfig, REQUIRED_CHECKPOINT_FILES};
use serde::Serialize;
use tokio::{io::AsyncWriteExt, process::Command};

use super::{EngineError, InferenceJob, SpeechEngine};

/// Longest engine error message passed back to clients
const MAX_ERROR_LEN: usize = 512;

/// Runs one local inference process per job, feeding the job as JSON on stdin
pub(crate) struct CommandEngine {
    config: CommandEngineConfig,
}

impl CommandEngine {
    pub const fn new(config: CommandEngineConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);

        for (k, v) in &self.config.env {
            cmd.env(k, v);
        }

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

#[derive(Serialize)]
struct CommandJob<'a> {
    #[serde(flatten)]
    job: &'a InferenceJob,
    model_dir: &'a Path,
    use_fp16: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
}

#[async_trait]
impl SpeechEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    async fn probe(&self) -> Result<(), EngineError> {
        let model_dir = &self.config.model_dir;

        if !tokio::fs::try_exists(model_dir).await? {
            return Err(EngineError::Unavailable(format!(
                "model directory '{}' does not exist",
                model_dir.display()
            )));
        }

        let mut missing = Vec::new();

        for file in REQUIRED_CHECKPOINT_FILES {
            if !tokio::fs::try_exists(model_dir.join(file)).await? {
                missing.push(file);
            }
        }

        if !missing.is_empty() {
            return Err(EngineError::Unavailable(format!(
                "missing checkpoint files in '{}': {}",
                model_dir.display(),
                missing.join(", ")
            )));
        }

        Ok(())
    }

    async fn infer(&self, job: &InferenceJob) -> Result<(), EngineError> {
        let payload = serde_json::to_vec(&CommandJob {
            job,
            model_dir: &self.config.model_dir,
            use_fp16: self.config.use_fp16,
            device: self.config.device.as_deref(),
        })
        .map_err(|e| EngineError::Inference(format!("failed to encode job: {e}")))?;

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("failed to spawn '{}': {e}", self.config.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits early closes the pipe; its exit status tells the story
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(error = %e, "engine process closed stdin early");
            }
        }

        let output = child.wait_with_output().await?;

        if job.params.verbose && !output.stdout.is_empty() {
            tracing::info!(stdout = %String::from_utf8_lossy(&output.stdout).trim_end(), "engine output");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(status = %output.status, stderr = %stderr.trim_end(), "engine process failed");

        Err(EngineError::Inference(failure_message(&stderr, output.status)))
    }
}

/// The last stderr line usually carries the exception message
fn failure_message(stderr: &str, status: std::process::ExitStatus) -> String {
    let Some(line) = stderr.lines().map(str::trim).rfind(|line| !line.is_empty()) else {
        return format!("engine process exited with {status}");
    };

    if line.len() <= MAX_ERROR_LEN {
        return line.to_string();
    }

    let mut end = MAX_ERROR_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &line[..end])
}
