//! WebSocket session contract.
//!
//! # Lifecycle
//! ```text
//! route returns Reply::Session(handler)
//!     → start(outbound)      once, when the upgraded socket is live
//!     → msg(text)*           sequential, in arrival order
//!     → closed(code, reason) exactly once, then the handler is dropped
//! ```
//!
//! `start` and the first `msg` are not ordered with respect to any work the
//! handler spawns from `start`; handlers must not assume otherwise.

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dispatch::types::HandlerError;

/// Close code used when the peer sent a close frame without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Synthetic close code reported when the stream ended without a close frame.
pub const CLOSE_STREAM_ENDED: u16 = 0;

/// Session object bound to one WebSocket connection for its lifetime.
pub trait MessageHandler: Send + 'static {
    /// Called once with the connection's outbound handle.
    fn start(&mut self, out: Outbound);

    /// Called for every inbound text frame.
    fn msg(&mut self, _msg: String) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(async { Ok(()) })
    }

    /// Called exactly once when the connection is gone.
    ///
    /// `code` is the peer's close code, or [`CLOSE_STREAM_ENDED`] when the
    /// stream terminated without a close frame.
    fn closed(&mut self, _code: u16, _reason: Option<String>) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Frames queued for the connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Ping(Vec<u8>),
    Close { code: u16, reason: String },
}

/// The connection has stopped accepting outbound frames.
#[derive(Debug, Error)]
#[error("websocket session {0} is closed")]
pub struct SessionClosed(pub Uuid);

/// Send capability for one live WebSocket connection.
///
/// Cheap to clone; clones may be moved into spawned tasks.
#[derive(Debug, Clone)]
pub struct Outbound {
    session_id: Uuid,
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Outbound {
    pub fn new(session_id: Uuid, tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Queue a text frame.
    pub fn send_msg(&self, msg: impl Into<String>) -> Result<(), SessionClosed> {
        self.push(OutboundMessage::Text(msg.into()))
    }

    /// Queue a ping frame.
    pub fn ping(&self, data: impl Into<Vec<u8>>) -> Result<(), SessionClosed> {
        self.push(OutboundMessage::Ping(data.into()))
    }

    /// Queue a close frame. Defaults to 1000 (normal closure).
    ///
    /// Frames queued after this one are discarded.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<(), SessionClosed> {
        self.push(OutboundMessage::Close {
            code: code.unwrap_or(1000),
            reason: reason.unwrap_or_default().to_owned(),
        })
    }

    fn push(&self, message: OutboundMessage) -> Result<(), SessionClosed> {
        self.tx
            .send(message)
            .map_err(|_| SessionClosed(self.session_id))
    }
}
