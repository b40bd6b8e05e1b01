//! WebSocket session handling.
//!
//! # Responsibilities
//! - Complete the upgrade handshake, then route with verb `ws`
//! - Close with an error code when routing fails
//! - Drive the selected handler: `start`, then `msg` per text frame, then `closed` once
//! - Drain the handler's outbound frames on a writer task
//!
//! # Data Flow
//! ```text
//! Client ── frames ──→ reader loop ──→ handler.msg / handler.closed
//! Client ←─ frames ─── writer task ←── Outbound (held by the handler)
//! ```
//!
//! # Design Decisions
//! - One handler per connection, selected once at upgrade time
//! - Frames are delivered strictly in order; `msg` is never called concurrently
//! - Per-connection failures close that socket only

use std::fmt::Display;
use std::time::Instant;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::http::request::Parts;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dispatch::session::{CLOSE_NO_STATUS, CLOSE_STREAM_ENDED};
use crate::dispatch::{engine, DispatchError, Inbound, MessageHandler, Outbound, OutboundMessage};
use crate::http::response::{close_code, status_for, CLOSE_INTERNAL_ERROR};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Inbound frame as seen by the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: u16, reason: Option<String> },
    /// Binary and control frames; pings are answered by the transport.
    Ignored,
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.to_string()),
            Message::Close(Some(frame)) => Frame::Close {
                code: frame.code,
                reason: Some(frame.reason.to_string()).filter(|r| !r.is_empty()),
            },
            Message::Close(None) => Frame::Close {
                code: CLOSE_NO_STATUS,
                reason: None,
            },
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => Frame::Ignored,
        }
    }
}

/// Accept the upgrade; routing runs once the socket is live.
pub fn upgrade(ws: WebSocketUpgrade, state: AppState, parts: Parts, request_id: String) -> Response {
    let failed_id = request_id.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(request_id = %failed_id, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| serve_socket(socket, state, parts, request_id))
}

async fn serve_socket(mut socket: WebSocket, state: AppState, parts: Parts, request_id: String) {
    let start = Instant::now();
    let session_id = Uuid::new_v4();
    let inbound = Inbound::websocket(&parts);

    match engine::dispatch_ws(&state.dispatcher, inbound, state.max_hops).await {
        Ok(handler) => {
            metrics::record_dispatch("ws", "session", start);
            tracing::info!(
                request_id = %request_id,
                session_id = %session_id,
                path = %parts.uri.path(),
                "WebSocket session started"
            );
            run_socket(socket, handler, session_id).await;
            tracing::info!(session_id = %session_id, "WebSocket session ended");
        }
        Err(e) => {
            metrics::record_dispatch("ws", e.kind(), start);
            log_failure(&request_id, parts.uri.path(), &e);
            let frame = CloseFrame {
                code: close_code(&e),
                reason: e.kind().into(),
            };
            if let Err(send_err) = socket.send(Message::Close(Some(frame))).await {
                tracing::debug!(request_id = %request_id, error = %send_err, "Failed to send close frame");
            }
        }
    }
}

fn log_failure(request_id: &str, path: &str, err: &DispatchError) {
    if status_for(err).is_client_error() {
        tracing::warn!(request_id = %request_id, path = %path, error = %err, "WebSocket dispatch rejected");
    } else {
        tracing::error!(request_id = %request_id, path = %path, error = %err, "WebSocket dispatch failed");
    }
}

/// Run `handler` against a live socket until the connection is gone.
pub async fn run_socket(socket: WebSocket, handler: Box<dyn MessageHandler>, session_id: Uuid) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbound_loop(sink, rx, session_id));
    let outbound = Outbound::new(session_id, tx);

    metrics::session_opened();
    run_session(stream.map(|m| m.map(Frame::from)), handler, outbound.clone()).await;
    metrics::session_closed();

    // Stop the writer even if the handler leaked clones of its outbound handle.
    let _ = outbound.close(None, None);
    drop(outbound);
    let _ = writer.await;
}

/// Deliver `frames` to `handler`.
///
/// `closed` is called exactly once: with the peer's close code, or with
/// [`CLOSE_STREAM_ENDED`] if the stream ends (or fails) without a close frame.
pub async fn run_session<S, E>(mut frames: S, mut handler: Box<dyn MessageHandler>, outbound: Outbound)
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let session_id = outbound.session_id();
    handler.start(outbound.clone());

    let mut peer_closed = false;
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Frame::Text(text)) => {
                if let Err(e) = handler.msg(text).await {
                    tracing::warn!(session_id = %session_id, error = %e, "Message handler failed");
                    let _ = outbound.close(Some(CLOSE_INTERNAL_ERROR), Some("handler_failure"));
                    break;
                }
            }
            Ok(Frame::Close { code, reason }) => {
                tracing::debug!(session_id = %session_id, code, "Peer closed");
                peer_closed = true;
                handler.closed(code, reason).await;
                break;
            }
            Ok(Frame::Ignored) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    if !peer_closed {
        handler.closed(CLOSE_STREAM_ENDED, None).await;
    }
}

async fn write_outbound_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    session_id: Uuid,
) {
    while let Some(message) = rx.recv().await {
        let (message, last) = match message {
            OutboundMessage::Text(text) => (Message::Text(text.into()), false),
            OutboundMessage::Ping(data) => (Message::Ping(data.into()), false),
            OutboundMessage::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })),
                true,
            ),
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            break;
        }
        if last {
            break;
        }
    }
}
