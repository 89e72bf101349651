//! `POST /` — inject one message into the engine over plain HTTP.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::app_state::RelayState;

/// `POST /` — Decode the body as an inbound envelope and forward it.
///
/// Answers `200 OK` with body `OK`, or `400` with body `Invalid JSON` when
/// the envelope is malformed.
pub async fn post_message(State(state): State<RelayState>, body: Bytes) -> Response {
    match state.inbound.handle_frame(&body) {
        Ok(_) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], "OK").into_response(),
        Err(e) => e.into_response(),
    }
}
