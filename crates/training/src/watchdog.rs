//! Silence watchdog for a running job.
//!
//! A trainer that hangs (or dies without the exit being observed) would
//! otherwise leave the job active forever and block every later launch.

use std::sync::Arc;
use std::time::Duration;

use trainhub_core::types::JobId;

use crate::tracker::ProgressTracker;

/// Mark `job_id` as failed once it has gone `timeout` without progress.
///
/// Returns when the job fails, finishes, or is replaced by a newer job.
pub async fn watch_silence(tracker: Arc<ProgressTracker>, job_id: JobId, timeout: Duration) {
    loop {
        let Some(idle) = tracker.idle_for(job_id) else {
            return;
        };
        if idle >= timeout {
            tracker.fail_job(job_id, "no progress received within the silence timeout");
            return;
        }
        tokio::time::sleep(timeout - idle).await;
    }
}

#[cfg(test)]
mod tests {
    use trainhub_core::progress::{ProgressReport, TrainingStatus};
    use trainhub_events::ProgressBus;

    use super::*;

    fn started() -> (Arc<ProgressTracker>, JobId) {
        let tracker = Arc::new(ProgressTracker::new(Arc::new(ProgressBus::default())));
        let job_id = JobId::new_v4();
        tracker.begin_job(job_id).unwrap();
        (tracker, job_id)
    }

    fn training(job_id: JobId, steps: u64) -> ProgressReport {
        ProgressReport {
            job_id: Some(job_id),
            steps_complete: steps,
            max_steps: 10,
            training_loss: Some(1.0),
            validation_loss: None,
            status: TrainingStatus::Training,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_job_marked_error() {
        let (tracker, job_id) = started();
        let handle = tokio::spawn(watch_silence(
            Arc::clone(&tracker),
            job_id,
            Duration::from_secs(60),
        ));

        handle.await.unwrap();
        assert_eq!(tracker.status(), TrainingStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_resets_the_timer() {
        let (tracker, job_id) = started();
        let handle = tokio::spawn(watch_silence(
            Arc::clone(&tracker),
            job_id,
            Duration::from_secs(60),
        ));

        tokio::time::sleep(Duration::from_secs(45)).await;
        tracker.apply_report(&training(job_id, 1));
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(tracker.status(), TrainingStatus::Training);

        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.await.unwrap();
        assert_eq!(tracker.status(), TrainingStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_job_stops_watchdog() {
        let (tracker, job_id) = started();
        let handle = tokio::spawn(watch_silence(
            Arc::clone(&tracker),
            job_id,
            Duration::from_secs(60),
        ));

        tracker.apply_report(&ProgressReport {
            status: TrainingStatus::Complete,
            ..training(job_id, 10)
        });

        handle.await.unwrap();
        assert_eq!(tracker.status(), TrainingStatus::Complete);
    }
}
