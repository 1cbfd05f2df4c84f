//! Trainer process launcher.
//!
//! [`JobLauncher::launch`] performs admission control, reserves the
//! tracker for a new job and spawns the trainer. It returns as soon as the
//! process is running; two background tasks then follow the job:
//!
//! - the exit supervisor waits for the process and, when it exits without
//!   having reported a terminal status, marks the job `error` once a grace
//!   period has passed (late messages still in flight get that long to land);
//! - the silence [`watchdog`](crate::watchdog) marks the job `error` when no
//!   progress arrives for too long.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use trainhub_core::training_config::TrainingConfig;
use trainhub_core::types::JobId;

use crate::error::LaunchError;
use crate::tracker::ProgressTracker;
use crate::watchdog;

/// How the trainer process is started and supervised.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Executable to run, e.g. `python3`.
    pub program: String,
    /// Arguments placed before the launch payload, e.g. the script path.
    pub args: Vec<String>,
    /// Endpoint the trainer pushes progress to; handed over in the payload.
    pub progress_endpoint: String,
    /// How long after the process exits a terminal report may still arrive.
    pub exit_grace: Duration,
    /// Fail the job after this long without progress. `None` disables it.
    pub silence_timeout: Option<Duration>,
}

/// JSON handed to the trainer as its last argument.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchPayload<'a> {
    #[serde(flatten)]
    config: &'a TrainingConfig,
    job_id: JobId,
    progress_endpoint: &'a str,
}

/// Starts trainer processes, one job at a time.
pub struct JobLauncher {
    tracker: Arc<ProgressTracker>,
    config: LauncherConfig,
}

impl JobLauncher {
    pub fn new(tracker: Arc<ProgressTracker>, config: LauncherConfig) -> Self {
        Self { tracker, config }
    }

    /// Launch a training job with `training`.
    ///
    /// Must be called from within a Tokio runtime. On rejection the
    /// progress record is left untouched. If the process cannot be spawned
    /// the reserved job is marked `error` so the next launch is admitted.
    pub fn launch(&self, training: &TrainingConfig) -> Result<JobId, LaunchError> {
        if !training.model_arch.is_configured() {
            return Err(LaunchError::NotConfigured);
        }
        training.check()?;

        let job_id = JobId::new_v4();
        let payload = serde_json::to_string(&LaunchPayload {
            config: training,
            job_id,
            progress_endpoint: &self.config.progress_endpoint,
        })?;

        self.tracker.begin_job(job_id)?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(&payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Shutting the server down takes the trainer with it.
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    %job_id,
                    program = %self.config.program,
                    error = %e,
                    "Failed to spawn trainer",
                );
                self.tracker.fail_job(job_id, "trainer could not be spawned");
                return Err(LaunchError::Spawn(e));
            }
        };

        tracing::info!(
            %job_id,
            pid = ?child.id(),
            model_arch = ?training.model_arch,
            max_epochs = %training.max_epochs,
            learning_rate = %training.learning_rate,
            "Trainer process spawned",
        );

        forward_output(job_id, "stdout", child.stdout.take());
        forward_output(job_id, "stderr", child.stderr.take());

        tokio::spawn(supervise_exit(
            Arc::clone(&self.tracker),
            job_id,
            child,
            self.config.exit_grace,
        ));

        if let Some(timeout) = self.config.silence_timeout {
            tokio::spawn(watchdog::watch_silence(
                Arc::clone(&self.tracker),
                job_id,
                timeout,
            ));
        }

        Ok(job_id)
    }
}

/// Relay each line the trainer prints to the log.
///
/// Reads until EOF whatever the bytes are: closing the pipe early would
/// make the trainer's next write fail.
fn forward_output<R>(job_id: JobId, stream: &'static str, handle: Option<R>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(handle) = handle else {
        return;
    };
    tokio::spawn(async move {
        let mut reader = BufReader::new(handle);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    tracing::debug!(%job_id, stream, line = %line.trim_end(), "Trainer output");
                }
                Err(e) => {
                    tracing::warn!(%job_id, stream, error = %e, "Failed to read trainer output");
                    break;
                }
            }
        }
    });
}

/// Wait for the trainer to exit and close the job if it never reported an end.
async fn supervise_exit(
    tracker: Arc<ProgressTracker>,
    job_id: JobId,
    mut child: Child,
    grace: Duration,
) {
    let exit = child.wait().await;
    match &exit {
        Ok(status) => tracing::info!(
            %job_id,
            exit_code = ?status.code(),
            success = status.success(),
            "Trainer process exited",
        ),
        Err(e) => tracing::error!(%job_id, error = %e, "Failed to wait for trainer process"),
    }

    if tracker.idle_for(job_id).is_none() {
        // Finished normally, or already replaced by a newer job.
        return;
    }

    tokio::time::sleep(grace).await;

    let reason = exit_reason(&exit);
    if tracker.fail_job(job_id, &reason) {
        tracing::warn!(%job_id, reason = %reason, "Trainer exited without reporting completion");
    }
}

fn exit_reason(exit: &std::io::Result<ExitStatus>) -> String {
    match exit {
        Ok(status) => match status.code() {
            Some(code) => format!("trainer exited with code {code} before reporting completion"),
            None => "trainer was killed by a signal before reporting completion".to_string(),
        },
        Err(e) => format!("lost track of trainer process: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
