//! Fallback for every unrouted method or path.

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Fallback for every method or path other than `GET /` and `POST /`.
pub async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
