use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use trainhub_training::LauncherConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Applies until the
    /// response head is sent, so it does not cut status streams short.
    pub request_timeout_secs: u64,
    /// Interval between keep-alive comments on idle status streams.
    pub sse_keep_alive_secs: u64,
    /// Where the trainer writes the fine-tuned weights.
    pub model_output_path: PathBuf,
    /// Trainer process and supervision settings.
    pub trainer: LauncherConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                       |
    /// |----------------------------------|-------------------------------|
    /// | `HOST`                           | `0.0.0.0`                     |
    /// | `PORT`                           | `3000`                        |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173`       |
    /// | `REQUEST_TIMEOUT_SECS`           | `30`                          |
    /// | `SSE_KEEP_ALIVE_SECS`            | `15`                          |
    /// | `MODEL_OUTPUT_PATH`              | `./trained_model/model.pth`   |
    /// | `PROGRESS_ENDPOINT`              | `tcp://127.0.0.1:8080`        |
    /// | `TRAINER_PROGRAM`                | `python3`                     |
    /// | `TRAINER_ARGS`                   | `./trainer/train.py`          |
    /// | `TRAINER_EXIT_GRACE_SECS`        | `5`                           |
    /// | `PROGRESS_SILENCE_TIMEOUT_SECS`  | `600` (`0` disables)          |
    ///
    /// Panics on unparsable values: misconfiguration should fail at startup.
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", 3000);

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 30);
        let sse_keep_alive_secs: u64 = parse_env::<u64>("SSE_KEEP_ALIVE_SECS", 15).max(1);
        let model_output_path = PathBuf::from(env_or("MODEL_OUTPUT_PATH", "./trained_model/model.pth"));

        let silence_secs: u64 = parse_env("PROGRESS_SILENCE_TIMEOUT_SECS", 600);
        let trainer = LauncherConfig {
            program: env_or("TRAINER_PROGRAM", "python3"),
            args: env_or("TRAINER_ARGS", "./trainer/train.py")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            progress_endpoint: env_or("PROGRESS_ENDPOINT", "tcp://127.0.0.1:8080"),
            exit_grace: Duration::from_secs(parse_env("TRAINER_EXIT_GRACE_SECS", 5)),
            silence_timeout: (silence_secs > 0).then(|| Duration::from_secs(silence_secs)),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            sse_keep_alive_secs,
            model_output_path,
            trainer,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
