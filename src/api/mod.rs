//! HTTP API server for chainward.
//!
//! Exposes the validation service over a small JSON API:
//! - `POST /api/validate`: run a full validation under the configured
//!   hard deadline
//! - `POST /api/plan`: return the planned job list without evaluating
//! - `GET /health`: liveness probe

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::{ValidationResult, Validator};
use crate::error::Error;
use crate::model::{WorkflowInstance, WorkflowModel};
use crate::store::SparqlStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    validator: Arc<Validator>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(validator: Arc<Validator>, config: Config) -> Self {
        Self {
            validator,
            config: Arc::new(config),
        }
    }
}

/// Map an error to an HTTP response with a sanitized body.
///
/// Full details are logged here; clients get the stable code and the
/// external message only.
fn error_response(e: Error) -> (StatusCode, Json<Value>) {
    error!("API error: {:?}", e);

    let status = match &e {
        Error::Model(_) | Error::Parse(_) | Error::UnknownActivityKind(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::NoChainFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::ValidationTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::StoreUnavailable(_) | Error::QueryFailed(_) | Error::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(e.to_external_json()))
}

/// Create CORS layer based on environment configuration.
///
/// - CHAINWARD_CORS_ORIGINS: Comma-separated allowed origins
/// - CHAINWARD_CORS_ALLOW_ALL: "true" to allow all origins (NOT
///   recommended for production)
pub fn create_cors_layer() -> CorsLayer {
    let allow_all = std::env::var("CHAINWARD_CORS_ALLOW_ALL")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    if allow_all {
        warn!("CORS configured to allow all origins - this is NOT secure for production!");
        return CorsLayer::very_permissive();
    }

    let origins_str = std::env::var("CHAINWARD_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(hv) => Some(hv),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// Request body for `/api/validate` and `/api/plan`.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub model: WorkflowModel,
    pub instance: WorkflowInstance,
    /// Include the per-job results in the response.
    #[serde(default)]
    pub detailed: bool,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ValidationResult>>,
}

/// Build the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/validate", post(validate))
        .route("/api/plan", post(plan))
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, (StatusCode, Json<Value>)> {
    let deadline = state.config.validation.deadline();
    let report = state
        .validator
        .validate_with_deadline(&request.model, &request.instance, deadline)
        .await
        .map_err(error_response)?;

    Ok(Json(ValidateResponse {
        success: true,
        valid: report.valid,
        results: request.detailed.then_some(report.results),
    }))
}

async fn plan(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let jobs = state
        .validator
        .plan(&request.model, &request.instance)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "success": true,
        "jobs": jobs,
    })))
}

/// Run the API server until ctrl-c.
pub async fn serve(config: Config) -> crate::error::Result<()> {
    let store = Arc::new(SparqlStore::new(config.store.to_sparql_config())?);
    let mut validator = Validator::new(store);
    if let Some(workers) = config.validation.workers {
        validator = validator.with_workers(workers);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(Arc::new(validator), config);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("chainward API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
