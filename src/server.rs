//! HTTP inference boundary.
//!
//! Serves predictions from one artifact set, loaded at startup:
//!
//! ```text
//! GET  /health   liveness and version
//! GET  /model    manifest of the loaded artifact set
//! POST /predict  {amplitude_mean, amplitude_std, phase_mean, phase_std} -> {label}
//! ```
//!
//! When no artifact set exists, or the one on disk cannot be loaded, the server
//! still starts; prediction and model requests then answer 503 with the code
//! of the load failure until it is restarted after a training run.

use crate::artifacts::{ArtifactManifest, ArtifactStore};
use crate::audit::SharedRunLog;
use crate::error::PipelineError;
use crate::inference::{predict_position, InferenceContext, PredictRequest, PredictResponse};
use crate::model::RandomForest;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Directory holding the artifact set to serve
    pub artifacts_dir: PathBuf,
    /// Counters updated per prediction
    pub run_log: SharedRunLog,
}

impl ServerConfig {
    pub fn new(port: u16, artifacts_dir: PathBuf, run_log: SharedRunLog) -> Self {
        Self {
            port,
            artifacts_dir,
            run_log,
        }
    }
}

/// Shared server state
pub struct ServerState {
    context: Option<InferenceContext>,
    manifest: Option<ArtifactManifest>,
    load_error: Option<LoadFailure>,
    run_log: SharedRunLog,
}

/// Why the artifact set is not being served.
#[derive(Debug, Clone)]
struct LoadFailure {
    code: &'static str,
    message: String,
}

impl From<&PipelineError> for LoadFailure {
    fn from(error: &PipelineError) -> Self {
        Self {
            code: error.code(),
            message: format!("artifact set could not be loaded: {}", error),
        }
    }
}

impl ServerState {
    /// Load the artifact set, starting untrained if it is absent or unusable.
    ///
    /// An unusable set is remembered so clients see why nothing is served.
    pub fn new(config: &ServerConfig) -> Self {
        let store = ArtifactStore::new(&config.artifacts_dir);
        let loaded = store
            .manifest()
            .and_then(|manifest| Ok((store.load::<RandomForest>()?, manifest)));

        let (context, manifest, load_error) = match loaded {
            Ok((context, manifest)) => (Some(context), Some(manifest), None),
            Err(PipelineError::NotTrained(reason)) => {
                tracing::warn!("No artifact set to serve: {}", reason);
                (None, None, None)
            }
            Err(e) => {
                tracing::error!("Failed to load artifact set: {}", e);
                (None, None, Some(LoadFailure::from(&e)))
            }
        };

        Self {
            context,
            manifest,
            load_error,
            run_log: config.run_log.clone(),
        }
    }

    /// 503 answer for requests that need a loaded artifact set.
    fn unavailable(&self) -> ApiError {
        let (code, error) = match &self.load_error {
            Some(failure) => (failure.code, failure.message.clone()),
            None => ("NOT_TRAINED", "no artifact set is loaded".to_string()),
        };
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub trained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        PipelineError::NotTrained(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(error: PipelineError) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
        tracing::error!("Prediction failed: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        trained: state.context.is_some(),
        load_error: state.load_error.as_ref().map(|f| f.code.to_string()),
    })
}

/// GET /model
async fn model(State(state): State<Arc<ServerState>>) -> Result<Json<ArtifactManifest>, ApiError> {
    state
        .manifest
        .clone()
        .map(Json)
        .ok_or_else(|| state.unavailable())
}

/// POST /predict
async fn predict(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        api_error(PipelineError::invalid_input("body", e.body_text()))
    })?;

    let Some(context) = state.context.as_ref() else {
        return Err(state.unavailable());
    };
    let response = predict_position(Some(context), &request).map_err(api_error)?;
    state.run_log.record_prediction();
    tracing::debug!(label = %response.label, "prediction served");
    Ok(Json(response))
}

/// Build the router around already loaded state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/model", get(model))
        .route("/predict", post(predict))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Classifier server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(&PipelineError::invalid_input("phase_std", "missing")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&PipelineError::NotTrained("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&PipelineError::Model("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
