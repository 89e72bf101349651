//! WebSocket connection loop.
//!
//! Owns the socket for its whole life: registers a [`ConnectionHandle`] on
//! open, answers inbound frames, writes queued broadcast frames, and
//! unregisters on close, error, or a close signal from the server.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use crate::app_state::RelayState;
use crate::domain::ConnectionHandle;
use crate::error::INVALID_JSON_REPLY;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Frames from the client go through the shared inbound handler; a
///   malformed frame is answered with `Invalid JSON` on this socket only.
/// - Broadcast frames queued on the connection's handle are written out.
/// - A close signal drops the socket immediately, discarding queued frames.
pub async fn run_connection(socket: WebSocket, state: RelayState) {
    let (conn, mut outbound_rx) = ConnectionHandle::new(state.outbound_buffer);
    let conn_id = conn.id();
    conn.mark_open();
    if let Err(e) = state.registry.add(conn.clone()).await {
        tracing::debug!(%conn_id, error = %e, "ws connection rejected");
        conn.mark_closed();
        return;
    }
    tracing::debug!(%conn_id, "ws connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            biased;

            () = conn.closed() => break,

            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !answer_frame(&state, text.as_str().as_bytes(), &mut ws_tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if !answer_frame(&state, &bytes, &mut ws_tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        state
                            .logger
                            .append_line(&format!("WebSocket error on {conn_id}: {e}"));
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.registry.remove(&conn).await;
    tracing::debug!(%conn_id, "ws connection closed");
}

/// Handles one inbound frame. Returns `false` if the socket is no longer
/// writable.
async fn answer_frame(
    state: &RelayState,
    raw: &[u8],
    ws_tx: &mut SplitSink<WebSocket, Message>,
) -> bool {
    match state.inbound.handle_frame(raw) {
        Ok(_) => true,
        Err(_) => ws_tx.send(Message::text(INVALID_JSON_REPLY)).await.is_ok(),
    }
}
