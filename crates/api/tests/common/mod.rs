#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use trainhub_api::config::ServerConfig;
use trainhub_api::router::build_app_router;
use trainhub_api::state::AppState;
use trainhub_core::training_config::TrainingConfig;
use trainhub_events::ProgressBus;
use trainhub_training::{JobLauncher, LauncherConfig, ProgressTracker};

/// A router plus handles on the shared state behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Holds the model output directory alive for the test's duration.
    pub model_dir: TempDir,
}

impl TestApp {
    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.state.tracker
    }

    pub fn model_path(&self) -> PathBuf {
        self.state.config.model_output_path.clone()
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build a test `ServerConfig` whose trainer is `sh -c <trainer_script>`.
///
/// The launch payload arrives in the script as `$1`. The progress endpoint
/// is never bound here; tests drive the tracker directly.
pub fn test_config(trainer_script: &str, model_dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        sse_keep_alive_secs: 15,
        model_output_path: model_dir.path().join("model.pth"),
        trainer: LauncherConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                trainer_script.to_string(),
                "trainer".to_string(),
            ],
            progress_endpoint: "tcp://127.0.0.1:5999".to_string(),
            exit_grace: Duration::from_millis(50),
            silence_timeout: None,
        },
    }
}

/// Build the full application router with all middleware layers, mirroring
/// the construction in `main.rs`.
pub fn build_test_app(trainer_script: &str) -> TestApp {
    build_test_app_with(trainer_script, |_| {})
}

/// Like [`build_test_app`], letting the test adjust the config first.
pub fn build_test_app_with(
    trainer_script: &str,
    customize: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let model_dir = tempfile::tempdir().expect("tempdir should be created");
    let mut config = test_config(trainer_script, &model_dir);
    customize(&mut config);

    let tracker = Arc::new(ProgressTracker::new(Arc::new(ProgressBus::default())));
    let launcher = Arc::new(JobLauncher::new(
        Arc::clone(&tracker),
        config.trainer.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        tracker,
        launcher,
        training_config: Arc::new(RwLock::new(TrainingConfig::default())),
        shutdown: CancellationToken::new(),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        model_dir,
    }
}

/// Trainer that stays up long enough for any test to finish.
pub const IDLE_TRAINER: &str = "sleep 30";

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Read a streaming body to its end, failing the test if it stays open.
pub async fn body_text_within(response: Response<Body>, limit: Duration) -> String {
    let bytes = tokio::time::timeout(limit, body_bytes(response))
        .await
        .expect("stream should close");
    String::from_utf8(bytes).expect("stream should be UTF-8")
}

pub fn resnet_config() -> serde_json::Value {
    serde_json::json!({
        "modelArch": "resnet",
        "maxEpochs": "3",
        "learningRate": "0.001",
    })
}
