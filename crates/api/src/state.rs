use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use trainhub_core::training_config::TrainingConfig;
use trainhub_training::{JobLauncher, ProgressTracker};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc` or is a token.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Owner of the progress record; also hands out bus subscriptions.
    pub tracker: Arc<ProgressTracker>,
    /// Admission control and trainer spawning.
    pub launcher: Arc<JobLauncher>,
    /// The active training configuration, replaced by each configure request.
    pub training_config: Arc<RwLock<TrainingConfig>>,
    /// Cancelled on shutdown so open status streams close.
    pub shutdown: CancellationToken,
}
