use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::provision::{ProvisionService, ProvisionTarget};

use super::error::ApiError;
use super::response::{HealthResponse, ProvisionResponse};

/// Shared application state.
pub struct AppState {
    /// Provisioning pipeline (locks, provisioner, reloader)
    pub service: ProvisionService,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,

    /// Maximum rule document size in bytes
    pub max_body_bytes: usize,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .route(
            "/api/v1/rules",
            put(handle_provision_fixed).fallback(handle_method_not_allowed),
        )
        .route(
            "/api/v1/rules/:mixin",
            put(handle_provision_mixin).fallback(handle_method_not_allowed),
        )
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Provision the single configured rule file.
async fn handle_provision_fixed(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ProvisionResponse>, ApiError> {
    let target = state.service.provisioner().fixed_target().inspect_err(|e| {
        warn!(error = %e, "Rejected provisioning request");
    })?;

    provision(&state, target, body).await
}

/// Provision the rule file of a named mixin.
async fn handle_provision_mixin(
    State(state): State<Arc<AppState>>,
    Path(mixin): Path<String>,
    body: Bytes,
) -> Result<Json<ProvisionResponse>, ApiError> {
    let target = state
        .service
        .provisioner()
        .mixin_target(&mixin)
        .inspect_err(|e| warn!(mixin = %mixin, error = %e, "Rejected provisioning request"))?;

    provision(&state, target, body).await
}

async fn provision(
    state: &AppState,
    target: ProvisionTarget,
    body: Bytes,
) -> Result<Json<ProvisionResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("provision", %request_id, rule_file = %target, bytes = body.len());

    let report = state.service.provision(target, body).instrument(span).await?;

    Ok(Json(ProvisionResponse::from_report(request_id, &report)))
}

async fn handle_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        reload_endpoint: state.service.reloader_endpoint().to_string(),
    })
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP ruleprov_uptime_seconds Application uptime in seconds
# TYPE ruleprov_uptime_seconds counter
ruleprov_uptime_seconds {}

{}"#,
        state.start_time.elapsed().as_secs(),
        state.service.metrics().to_prometheus(),
    );

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}
