use std::sync::Arc;

use axum::response::sse::Event;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trainhub_core::progress::{ProgressState, TrainingStatus};
use trainhub_core::types::JobId;
use trainhub_events::Subscription;
use trainhub_training::ProgressTracker;

/// One unit written to a status stream client.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// A progress record the client has not seen yet.
    Snapshot(ProgressState),
    /// The job reached this terminal status; the stream closes after it.
    End(TrainingStatus),
}

impl StreamFrame {
    /// Render as an SSE event: snapshots as JSON, the end marker as the bare
    /// status word (`complete` or `error`).
    pub fn into_event(self) -> Result<Event, axum::Error> {
        match self {
            StreamFrame::Snapshot(progress) => Event::default().json_data(&progress),
            StreamFrame::End(status) => Ok(Event::default().data(status.as_str())),
        }
    }
}

/// Forward progress changes to one stream client.
///
/// Writes the current record first, then re-reads the record on every bus
/// notification and writes it when the revision moved. Stops after the
/// terminal frame, when the client hangs up (`tx` closed), when `shutdown`
/// fires, or when the bus goes away. The subscription is dropped on every
/// exit path, which unsubscribes it.
///
/// `subscription` must be taken before the caller inspected the record so
/// no change falls between the two.
pub async fn relay(
    tracker: Arc<ProgressTracker>,
    mut subscription: Subscription,
    tx: mpsc::Sender<StreamFrame>,
    shutdown: CancellationToken,
) {
    let mut followed: Option<JobId> = None;
    let mut last_revision: Option<u64> = None;

    loop {
        let snapshot = tracker.snapshot();

        if let Some(job_id) = followed {
            if snapshot.job_id != Some(job_id) {
                // A newer job was admitted, so ours finished in between.
                finish_replaced(&tracker, job_id, &tx).await;
                return;
            }
        }
        followed = snapshot.job_id;

        let status = snapshot.progress.status;
        if last_revision != Some(snapshot.revision) {
            last_revision = Some(snapshot.revision);
            if tx.send(StreamFrame::Snapshot(snapshot.progress)).await.is_err() {
                tracing::debug!("Status stream client disconnected");
                return;
            }
        }

        if status.is_terminal() {
            let _ = tx.send(StreamFrame::End(status)).await;
            tracing::debug!(job_id = ?followed, %status, "Status stream finished");
            return;
        }

        tokio::select! {
            delivery = subscription.recv() => {
                if delivery.is_none() {
                    tracing::debug!("Progress bus closed, ending status stream");
                    return;
                }
            }
            () = tx.closed() => {
                tracing::debug!(job_id = ?followed, "Status stream client disconnected");
                return;
            }
            () = shutdown.cancelled() => {
                tracing::debug!(job_id = ?followed, "Closing status stream for shutdown");
                return;
            }
        }
    }
}

async fn finish_replaced(tracker: &ProgressTracker, job_id: JobId, tx: &mpsc::Sender<StreamFrame>) {
    match tracker.finished_outcome(job_id) {
        Some(outcome) => {
            let status = outcome.status;
            if tx.send(StreamFrame::Snapshot(outcome)).await.is_ok() {
                let _ = tx.send(StreamFrame::End(status)).await;
            }
        }
        None => {
            // Too many jobs finished since; the client still gets an end marker.
            tracing::warn!(%job_id, "Outcome of followed job no longer available");
            let _ = tx.send(StreamFrame::End(TrainingStatus::Error)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
