//! Progress ingestion listener.
//!
//! Binds a ZeroMQ PULL socket once at startup and feeds every frame the
//! trainer pushes into the [`ProgressTracker`]. A bad frame is logged and
//! dropped; nothing a producer sends can stop the listener.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use trainhub_core::progress::ProgressReport;
use zeromq::{PullSocket, Socket, SocketRecv};

use crate::error::IngestError;
use crate::tracker::{ApplyOutcome, ProgressTracker};

/// Pause after a socket error so a broken socket cannot spin the loop.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Longest slice of a rejected frame echoed into the log.
const MAX_LOGGED_FRAME: usize = 256;

/// Owner of the bound PULL socket.
pub struct IngestListener {
    socket: PullSocket,
    endpoint: String,
    tracker: Arc<ProgressTracker>,
}

impl IngestListener {
    /// Bind the PULL socket at `endpoint` (e.g. `tcp://127.0.0.1:8080`).
    pub async fn bind(endpoint: &str, tracker: Arc<ProgressTracker>) -> Result<Self, IngestError> {
        let mut socket = PullSocket::new();
        let bound = socket.bind(endpoint).await?;
        let endpoint = bound.to_string();
        tracing::info!(%endpoint, "Progress listener bound");

        Ok(Self {
            socket,
            endpoint,
            tracker,
        })
    }

    /// The resolved endpoint, with the real port when bound to port 0.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Receive until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!(endpoint = %self.endpoint, "Progress listener stopped");
                    break;
                }
                received = self.socket.recv() => match received {
                    Ok(message) => {
                        if message.len() > 1 {
                            tracing::warn!(frames = message.len(), "Multipart progress message, using first frame");
                        }
                        match message.get(0) {
                            Some(frame) => match ingest_frame(&self.tracker, frame) {
                                Ok(outcome) => tracing::trace!(?outcome, "Progress frame handled"),
                                // Logged with the raw frame by ingest_frame.
                                Err(IngestError::Malformed(_)) => {}
                                Err(e) => tracing::warn!(error = %e, "Dropping progress message"),
                            },
                            None => tracing::warn!(error = %IngestError::Empty, "Dropping progress message"),
                        }
                    }
                    Err(e) => {
                        let err = IngestError::from(e);
                        tracing::warn!(error = %err, "Progress socket receive failed");
                        tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }
}

/// Parse one raw frame and apply it to the tracker.
///
/// Malformed frames are logged at `warn` and leave the record unchanged.
pub fn ingest_frame(tracker: &ProgressTracker, frame: &[u8]) -> Result<ApplyOutcome, IngestError> {
    let report = match ProgressReport::from_slice(frame) {
        Ok(report) => report,
        Err(e) => {
            let shown = &frame[..frame.len().min(MAX_LOGGED_FRAME)];
            tracing::warn!(
                error = %e,
                raw_message = %String::from_utf8_lossy(shown),
                "Dropping malformed progress message",
            );
            return Err(IngestError::Malformed(e));
        }
    };

    let outcome = tracker.apply_report(&report);
    match outcome {
        ApplyOutcome::Applied => {}
        ApplyOutcome::StaleJob => tracing::warn!(
            job_id = ?report.job_id,
            status = %report.status,
            "Dropping progress for a job that is no longer current",
        ),
        ApplyOutcome::Regression => tracing::warn!(
            status = %report.status,
            "Dropping progress that would move the status backwards",
        ),
        ApplyOutcome::NoJob | ApplyOutcome::Finished => tracing::debug!(
            status = %report.status,
            ?outcome,
            "Dropping progress received while no job is running",
        ),
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use trainhub_core::progress::{ProgressState, TrainingStatus};
    use trainhub_core::types::JobId;
    use trainhub_events::ProgressBus;

    use super::*;

    fn started() -> (ProgressTracker, JobId) {
        let tracker = ProgressTracker::new(Arc::new(ProgressBus::default()));
        let job_id = JobId::new_v4();
        tracker.begin_job(job_id).unwrap();
        (tracker, job_id)
    }

    #[test]
    fn valid_frame_updates_state() {
        let (tracker, _) = started();
        let frame = br#"{"stepsComplete":5,"maxSteps":100,"trainingLoss":0.8,"validationLoss":null,"status":"training"}"#;

        assert_matches!(ingest_frame(&tracker, frame), Ok(ApplyOutcome::Applied));
        assert_eq!(
            tracker.snapshot().progress,
            ProgressState {
                steps_complete: 5,
                max_steps: 100,
                training_loss: Some(0.8),
                validation_loss: None,
                status: TrainingStatus::Training,
            }
        );
    }

    #[test]
    fn frame_missing_status_leaves_state_unchanged() {
        let (tracker, _) = started();
        let before = tracker.snapshot();
        let frame = br#"{"stepsComplete":5,"maxSteps":100,"trainingLoss":0.8,"validationLoss":null}"#;

        assert_matches!(ingest_frame(&tracker, frame), Err(IngestError::Malformed(_)));
        assert_eq!(tracker.snapshot(), before);
    }

    #[test]
    fn garbage_frame_rejected() {
        let (tracker, _) = started();
        assert_matches!(
            ingest_frame(&tracker, b"\xff\x00not json"),
            Err(IngestError::Malformed(_))
        );
        assert_eq!(tracker.status(), TrainingStatus::Started);
    }

    #[test]
    fn tagged_frame_for_other_job_dropped() {
        let (tracker, _) = started();
        let frame = format!(
            r#"{{"jobId":"{}","stepsComplete":1,"maxSteps":2,"trainingLoss":null,"validationLoss":null,"status":"complete"}}"#,
            JobId::new_v4()
        );

        assert_matches!(
            ingest_frame(&tracker, frame.as_bytes()),
            Ok(ApplyOutcome::StaleJob)
        );
        assert_eq!(tracker.status(), TrainingStatus::Started);
    }

    #[test]
    fn tagged_frame_for_current_job_applied() {
        let (tracker, job_id) = started();
        let frame = format!(
            r#"{{"jobId":"{job_id}","stepsComplete":2,"maxSteps":2,"trainingLoss":0.1,"validationLoss":0.2,"status":"complete"}}"#
        );

        assert_matches!(
            ingest_frame(&tracker, frame.as_bytes()),
            Ok(ApplyOutcome::Applied)
        );
        assert_eq!(tracker.status(), TrainingStatus::Complete);
    }

    #[tokio::test]
    async fn listener_binds_ephemeral_port_and_stops_on_cancel() {
        let tracker = Arc::new(ProgressTracker::new(Arc::new(ProgressBus::default())));
        let listener = IngestListener::bind("tcp://127.0.0.1:0", tracker)
            .await
            .expect("bind should succeed");
        assert!(listener.endpoint().starts_with("tcp://127.0.0.1:"));
        assert!(!listener.endpoint().ends_with(":0"));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn pushed_frames_reach_the_tracker() {
        use zeromq::{PushSocket, SocketSend, ZmqMessage};

        let tracker = Arc::new(ProgressTracker::new(Arc::new(ProgressBus::default())));
        tracker.begin_job(JobId::new_v4()).unwrap();
        let listener = IngestListener::bind("tcp://127.0.0.1:0", Arc::clone(&tracker))
            .await
            .expect("bind should succeed");
        let endpoint = listener.endpoint().to_string();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));

        let mut push = PushSocket::new();
        push.connect(&endpoint).await.expect("connect should succeed");
        push.send(ZmqMessage::from("not json".to_string()))
            .await
            .unwrap();
        push.send(ZmqMessage::from(format!(
            r#"{{"jobId":"{}","stepsComplete":8,"maxSteps":9,"trainingLoss":null,"validationLoss":null,"status":"complete"}}"#,
            JobId::new_v4()
        )))
        .await
        .unwrap();
        push.send(ZmqMessage::from(
            r#"{"stepsComplete":3,"maxSteps":9,"trainingLoss":"Infinity","validationLoss":null,"status":"training"}"#
                .to_string(),
        ))
        .await
        .unwrap();

        let applied = async {
            while tracker.status() != TrainingStatus::Training {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), applied)
            .await
            .expect("frame should be applied");
        assert_eq!(tracker.snapshot().progress.steps_complete, 3);

        cancel.cancel();
        handle.await.unwrap();
    }
}
