use trainhub_core::error::CoreError;

/// Why a launch request was refused or failed.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("no architecture selected")]
    NotConfigured,

    #[error("job already running")]
    AlreadyRunning,

    #[error(transparent)]
    InvalidConfig(#[from] CoreError),

    #[error("failed to encode launch payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("failed to spawn trainer: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failures on the progress ingestion path. None of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed progress message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("progress message has no frames")]
    Empty,

    #[error("progress socket error: {0}")]
    Socket(#[from] zeromq::ZmqError),
}
