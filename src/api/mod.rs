//! HTTP surface: router composition for both transports.
//!
//! | Method | Path | Handler                               |
//! |--------|------|---------------------------------------|
//! | `GET`  | `/`  | WebSocket upgrade ([`crate::ws`])     |
//! | `POST` | `/`  | inbound envelope over HTTP            |
//! | any    | any  | `404 Not Found`                       |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::app_state::RelayState;
use crate::ws::handler::ws_handler;

/// Builds the relay router with its state attached.
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route(
            "/",
            get(ws_handler)
                .post(handlers::message::post_message)
                .fallback(handlers::system::not_found),
        )
        .fallback(handlers::system::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
