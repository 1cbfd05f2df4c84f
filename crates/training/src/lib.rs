//! Training job lifecycle.
//!
//! - [`ProgressTracker`]: owns the progress record and serializes every
//!   read and write of it; publishes changes on the [`ProgressBus`].
//! - [`JobLauncher`]: admission control and trainer process spawning.
//! - [`IngestListener`]: ZeroMQ PULL socket feeding trainer reports into
//!   the tracker.
//! - [`watchdog`]: marks a job failed when its trainer goes quiet.
//!
//! [`ProgressBus`]: trainhub_events::ProgressBus

pub mod error;
pub mod ingest;
pub mod launcher;
pub mod tracker;
pub mod watchdog;

pub use error::{IngestError, LaunchError};
pub use ingest::{ingest_frame, IngestListener};
pub use launcher::{JobLauncher, LauncherConfig};
pub use tracker::{ApplyOutcome, ProgressTracker};
