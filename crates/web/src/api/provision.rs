//! Account provisioning function endpoint.
//!
//! `OPTIONS` answers a CORS preflight without touching the backend. Every
//! other method runs one provisioning batch, whatever the request body.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use tracing::{info, warn};

use crate::api::status::AppError;
use crate::AppState;

pub fn routes(function_path: &str) -> Router<Arc<AppState>> {
    Router::new().route(function_path, any(provision))
}

async fn provision(
    State(state): State<Arc<AppState>>,
    method: Method,
) -> Result<Response, AppError> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }

    info!(method = %method, "provisioning requested");
    let report = state.provisioner.run().await.map_err(|e| {
        warn!(error = %e, "provisioning aborted");
        AppError::from(e)
    })?;

    Ok(Json(report).into_response())
}
