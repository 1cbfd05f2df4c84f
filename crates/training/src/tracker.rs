//! Shared progress record and its concurrency guard.
//!
//! [`ProgressTracker`] is the only owner of the [`ProgressState`]. Every
//! read and write goes through one `Mutex`, held only for field assignment:
//! no I/O and no `.await` happen under it. Change notifications are
//! published on the [`ProgressBus`] after the lock is released, so a
//! subscriber re-reading the record always sees a complete update.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use trainhub_core::progress::{ProgressReport, ProgressSnapshot, ProgressState, TrainingStatus};
use trainhub_core::types::{JobId, Timestamp};
use trainhub_events::{ProgressBus, ProgressEvent, Subscription};

use crate::error::LaunchError;

/// Finished jobs whose final record stays available to slow stream readers.
const RECENT_OUTCOMES: usize = 8;

/// What happened to a progress report handed to [`ProgressTracker::apply_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The report replaced the progress record.
    Applied,
    /// No job has been launched yet.
    NoJob,
    /// The report names a job other than the current one.
    StaleJob,
    /// The current job already reached a terminal status.
    Finished,
    /// The report's status ranks below the current one.
    Regression,
}

struct ActiveJob {
    id: JobId,
    started_at: Timestamp,
    last_activity: Instant,
}

struct TrackerState {
    progress: ProgressState,
    job: Option<ActiveJob>,
    revision: u64,
    /// Final records of the most recently finished jobs, newest last.
    recent_outcomes: VecDeque<(JobId, ProgressState)>,
}

impl TrackerState {
    /// Bump the revision and build the matching notification.
    fn commit(&mut self) -> ProgressEvent {
        self.revision += 1;
        let job_id = self.job.as_ref().map(|job| job.id);
        if self.progress.status.is_terminal() {
            if let Some(id) = job_id {
                if self.recent_outcomes.len() == RECENT_OUTCOMES {
                    self.recent_outcomes.pop_front();
                }
                self.recent_outcomes.push_back((id, self.progress.clone()));
            }
        }
        ProgressEvent {
            revision: self.revision,
            job_id,
            status: self.progress.status,
        }
    }

    fn current_job(&self, job_id: JobId) -> Option<&ActiveJob> {
        self.job.as_ref().filter(|job| job.id == job_id)
    }
}

/// Owner of the process-wide progress record.
///
/// Built once at startup and shared via `Arc` with the launcher, the
/// ingestion listener and every status stream.
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    bus: Arc<ProgressBus>,
}

impl ProgressTracker {
    pub fn new(bus: Arc<ProgressBus>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                progress: ProgressState::not_started(),
                job: None,
                revision: 0,
                recent_outcomes: VecDeque::with_capacity(RECENT_OUTCOMES),
            }),
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    /// Subscribe to change notifications.
    ///
    /// Subscribe before taking the baseline [`snapshot`](Self::snapshot) so
    /// no change can slip between the two.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // The state is plain data assigned field by field; a panic elsewhere
        // cannot leave it half-written, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            job_id: state.job.as_ref().map(|job| job.id),
            revision: state.revision,
            started_at: state.job.as_ref().map(|job| job.started_at),
            progress: state.progress.clone(),
        }
    }

    pub fn status(&self) -> TrainingStatus {
        self.lock().progress.status
    }

    /// A job is launched and has not reached a terminal status.
    pub fn is_job_active(&self) -> bool {
        self.status().is_active()
    }

    /// Admission control: reserve the tracker for a new job.
    ///
    /// Atomically checks that no job is active and resets the record to
    /// `started` under `job_id`. Of any number of concurrent callers exactly
    /// one succeeds while a job is active.
    pub fn begin_job(&self, job_id: JobId) -> Result<(), LaunchError> {
        let event = {
            let mut state = self.lock();
            if state.progress.status.is_active() {
                return Err(LaunchError::AlreadyRunning);
            }
            state.progress = ProgressState::started();
            state.job = Some(ActiveJob {
                id: job_id,
                started_at: Utc::now(),
                last_activity: Instant::now(),
            });
            state.commit()
        };

        tracing::info!(%job_id, revision = event.revision, "Training job started");
        self.bus.publish(event);
        Ok(())
    }

    /// Apply a trainer report.
    ///
    /// An applied report replaces all five progress fields at once.
    /// Everything else leaves the record untouched.
    pub fn apply_report(&self, report: &ProgressReport) -> ApplyOutcome {
        let event = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let Some(job) = state.job.as_mut() else {
                return ApplyOutcome::NoJob;
            };
            if report.job_id.is_some_and(|id| id != job.id) {
                return ApplyOutcome::StaleJob;
            }
            let current = state.progress.status;
            if current.is_terminal() {
                return ApplyOutcome::Finished;
            }
            if !current.can_advance_to(report.status) {
                return ApplyOutcome::Regression;
            }

            job.last_activity = Instant::now();
            state.progress = report.to_state();
            state.commit()
        };

        tracing::debug!(
            job_id = ?event.job_id,
            revision = event.revision,
            status = %event.status,
            "Progress applied",
        );
        self.bus.publish(event);
        ApplyOutcome::Applied
    }

    /// Mark `job_id` as failed if it is still the active job.
    ///
    /// Progress counters are kept so subscribers see how far the job got.
    /// Returns `false` when the job already finished or was replaced.
    pub fn fail_job(&self, job_id: JobId, reason: &str) -> bool {
        let event = {
            let mut state = self.lock();
            if state.current_job(job_id).is_none() || !state.progress.status.is_active() {
                return false;
            }
            state.progress.status = TrainingStatus::Error;
            state.commit()
        };

        tracing::warn!(%job_id, reason, revision = event.revision, "Training job failed");
        self.bus.publish(event);
        true
    }

    /// Final record of `job_id` if it is among the recently finished jobs.
    pub fn finished_outcome(&self, job_id: JobId) -> Option<ProgressState> {
        self.lock()
            .recent_outcomes
            .iter()
            .rev()
            .find(|(id, _)| *id == job_id)
            .map(|(_, progress)| progress.clone())
    }

    /// Time since `job_id` last made progress, while it is still active.
    pub fn idle_for(&self, job_id: JobId) -> Option<Duration> {
        let state = self.lock();
        if !state.progress.status.is_active() {
            return None;
        }
        state
            .current_job(job_id)
            .map(|job| job.last_activity.elapsed())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
