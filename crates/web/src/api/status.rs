//! Health check endpoint and the shared API error type.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use travelsafe_core::config::HEALTH_PATH;
use travelsafe_core::errors::ProvisionError;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(HEALTH_PATH, get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ---------------------------------------------------------------------------
// Shared error type for API handlers
// ---------------------------------------------------------------------------

/// API error type that converts to an Axum response with an `error` body.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
}

impl From<ProvisionError> for AppError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Fetch(e) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
