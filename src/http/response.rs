//! Response rendering and error mapping.
//!
//! # Responsibilities
//! - Render route values as `200 application/json`
//! - Map dispatch errors to HTTP status codes and WebSocket close codes
//!
//! # Design Decisions
//! - Routes cannot choose a status; every successful value is a 200
//! - The empty reply renders as JSON `null`
//! - Server-side failures do not echo handler messages to the client

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::dispatch::DispatchError;

/// Close code sent when no WebSocket route matched.
pub const CLOSE_NO_ROUTE: u16 = 4404;

/// Close code for payloads that could not be decoded (RFC 6455 "invalid payload").
pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;

/// Close code for payloads over the size limit (RFC 6455 "message too big").
pub const CLOSE_MESSAGE_TOO_BIG: u16 = 1009;

/// Close code for server-side failures (RFC 6455 "internal error").
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Render a route value.
pub fn json(value: Option<Value>) -> Response {
    (StatusCode::OK, Json(value.unwrap_or(Value::Null))).into_response()
}

pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::NoRoute { .. } => StatusCode::NOT_FOUND,
        DispatchError::Decode(_) => StatusCode::BAD_REQUEST,
        DispatchError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        DispatchError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
        DispatchError::Handler(_)
        | DispatchError::ProtocolMisuse(_)
        | DispatchError::TooManyHops(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn close_code(err: &DispatchError) -> u16 {
    match err {
        DispatchError::NoRoute { .. } => CLOSE_NO_ROUTE,
        DispatchError::Decode(_) => CLOSE_INVALID_PAYLOAD,
        DispatchError::PayloadTooLarge(_) => CLOSE_MESSAGE_TOO_BIG,
        _ => CLOSE_INTERNAL_ERROR,
    }
}

/// Render a dispatch failure as `{"error": kind, "message": ...}`.
pub fn error(err: &DispatchError) -> Response {
    let status = status_for(err);
    let message = if status.is_server_error() {
        "Internal server error".to_string()
    } else {
        err.to_string()
    };

    (
        status,
        Json(json!({
            "error": err.kind(),
            "message": message,
        })),
    )
        .into_response()
}
