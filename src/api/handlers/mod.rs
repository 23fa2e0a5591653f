//! API handlers for the dashboard.

pub mod admin;
pub mod entity_goals;
pub mod health;
pub mod kpis;
pub mod reviews;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// `{ "ok": false, "error": message }` with `status`.
pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
}

/// Fallback for unknown routes, so `/admin/*` misses still pass the guard.
pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Not found")
}
