//! Training progress model.
//!
//! [`ProgressState`] is the record streamed to status subscribers,
//! [`ProgressReport`] is the wire message the trainer pushes on the
//! ingestion socket, and [`TrainingStatus`] carries the lifecycle ordering
//! both of them obey.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// TrainingStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a training job.
///
/// Statuses only move forward:
///
/// ```text
/// not_started -> started -> {training, validating}* -> {complete, error}
/// ```
///
/// `training` and `validating` share a rank because the trainer alternates
/// between them once per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    #[default]
    #[serde(alias = "not started")]
    NotStarted,
    Started,
    Training,
    Validating,
    Complete,
    Error,
}

impl TrainingStatus {
    /// Position in the lifecycle ordering.
    pub fn rank(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Started => 1,
            Self::Training | Self::Validating => 2,
            Self::Complete | Self::Error => 3,
        }
    }

    /// `complete` and `error` end a job.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// A job has been launched and has not finished yet.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Started | Self::Training | Self::Validating)
    }

    /// Whether a job currently in `self` may move to `next`.
    ///
    /// Terminal statuses accept nothing; everything else accepts any status
    /// of equal or higher rank.
    pub fn can_advance_to(self, next: TrainingStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Started => "started",
            Self::Training => "training",
            Self::Validating => "validating",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProgressState
// ---------------------------------------------------------------------------

/// Latest known progress of the active (or most recent) job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub steps_complete: u64,
    pub max_steps: u64,
    /// `None` until the trainer reports its first training batch.
    pub training_loss: Option<f64>,
    /// `None` until the trainer reports its first validation batch.
    pub validation_loss: Option<f64>,
    pub status: TrainingStatus,
}

impl ProgressState {
    /// Record before any job was launched.
    pub fn not_started() -> Self {
        Self::with_status(TrainingStatus::NotStarted)
    }

    /// Record a freshly launched job starts from.
    pub fn started() -> Self {
        Self::with_status(TrainingStatus::Started)
    }

    fn with_status(status: TrainingStatus) -> Self {
        Self {
            steps_complete: 0,
            max_steps: 0,
            training_loss: None,
            validation_loss: None,
            status,
        }
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::not_started()
    }
}

/// Point-in-time copy of the tracker's state handed to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Job the progress belongs to; `None` before the first launch.
    pub job_id: Option<JobId>,
    /// Incremented on every applied change.
    pub revision: u64,
    pub started_at: Option<Timestamp>,
    pub progress: ProgressState,
}

// ---------------------------------------------------------------------------
// ProgressReport (wire format)
// ---------------------------------------------------------------------------

/// Progress message pushed by the trainer.
///
/// All five progress fields are required; the losses may be `null`.
/// `jobId` is optional so untagged producers keep working, but a tagged
/// message is only applied to the job it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    #[serde(default)]
    pub job_id: Option<JobId>,
    pub steps_complete: u64,
    pub max_steps: u64,
    #[serde(deserialize_with = "deserialize_loss")]
    pub training_loss: Option<f64>,
    #[serde(deserialize_with = "deserialize_loss")]
    pub validation_loss: Option<f64>,
    pub status: TrainingStatus,
}

impl ProgressReport {
    /// Parse a raw frame from the ingestion socket.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The full record this report replaces the current state with.
    pub fn to_state(&self) -> ProgressState {
        ProgressState {
            steps_complete: self.steps_complete,
            max_steps: self.max_steps,
            training_loss: self.training_loss,
            validation_loss: self.validation_loss,
            status: self.status,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLoss {
    Number(f64),
    Text(String),
}

/// Accept a finite number or `null`. Older trainers sent `Infinity` as the
/// "not yet available" placeholder; it maps to `None` as well.
fn deserialize_loss<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawLoss>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawLoss::Number(value)) if value.is_finite() => Ok(Some(value)),
        Some(RawLoss::Number(_)) => Ok(None),
        Some(RawLoss::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "infinity" | "inf" => Ok(None),
            _ => Err(D::Error::custom(format!("invalid loss value '{text}'"))),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
