//! Dispatch resolution.
//!
//! # Algorithm
//! ```text
//! tokenize path (root → [""])
//! loop:
//!     lookup {verb}_{segment}, then any_{segment}    → NoRoute if neither
//!     consume the segment
//!     payload = body or query (decoded once)
//!     reply = route(payload, request).await          → Handler error propagates
//!     Delegate → continue with the child dispatcher and the returned request
//!     Json / Empty / Session → terminal
//! ```
//!
//! # Design Decisions
//! - A segment is consumed before the route runs, so each route only sees its sub-path
//! - Delegations from the root segment consume no path; more than `max_hops`
//!   of them in a row fails instead of looping
//! - Transport mismatches (HTTP ending in a session, WS ending in a value) are errors

use serde_json::Value;

use crate::dispatch::path::tokenize;
use crate::dispatch::request::Inbound;
use crate::dispatch::session::MessageHandler;
use crate::dispatch::table::Dispatcher;
use crate::dispatch::types::{DispatchError, PublicRequest, Reply};

/// Terminal state of a successful resolution.
pub enum Resolution {
    /// Plain value; `None` is the empty reply.
    Respond(Option<Value>),
    /// WebSocket session handoff.
    Session(Box<dyn MessageHandler>),
}

/// Resolve `inbound` against `root`, following delegations.
pub async fn resolve(
    root: &Dispatcher,
    inbound: &mut Inbound,
    max_hops: usize,
) -> Result<Resolution, DispatchError> {
    let verb = inbound.verb().clone();
    let mut request = PublicRequest::new(tokenize(inbound.path()), inbound.headers().clone());
    let mut dispatcher = root.clone();
    let mut hops = 0;

    loop {
        request.ensure_root_segment();
        let segment = request.peek_segment().unwrap_or_default().to_owned();

        let Some((key, route)) = dispatcher.lookup(&verb, &segment) else {
            tracing::debug!(
                dispatcher = %dispatcher.name(),
                verb = %verb,
                segment = %segment,
                "No route matched"
            );
            return Err(DispatchError::NoRoute {
                verb: verb.to_string(),
                segment,
            });
        };

        request.next_segment();
        let payload = inbound.payload().await?;

        tracing::debug!(
            dispatcher = %dispatcher.name(),
            route = %key,
            remaining = request.remaining(),
            hop = hops,
            "Invoking route"
        );

        match route(payload, request).await? {
            Reply::Delegate {
                dispatcher: next,
                request: next_request,
            } => {
                if segment.is_empty() {
                    hops += 1;
                    if hops > max_hops {
                        return Err(DispatchError::TooManyHops(max_hops));
                    }
                } else {
                    hops = 0;
                }
                dispatcher = next;
                request = next_request;
            }
            Reply::Json(value) => return Ok(Resolution::Respond(Some(value))),
            Reply::Empty => return Ok(Resolution::Respond(None)),
            Reply::Session(handler) => return Ok(Resolution::Session(handler)),
        }
    }
}

/// Resolve a plain HTTP request to the value to render.
pub async fn dispatch_http(
    root: &Dispatcher,
    mut inbound: Inbound,
    max_hops: usize,
) -> Result<Option<Value>, DispatchError> {
    match resolve(root, &mut inbound, max_hops).await? {
        Resolution::Respond(value) => Ok(value),
        Resolution::Session(_) => Err(DispatchError::ProtocolMisuse(
            "http route returned a message handler",
        )),
    }
}

/// Resolve an upgraded WebSocket request to its session handler.
pub async fn dispatch_ws(
    root: &Dispatcher,
    mut inbound: Inbound,
    max_hops: usize,
) -> Result<Box<dyn MessageHandler>, DispatchError> {
    match resolve(root, &mut inbound, max_hops).await? {
        Resolution::Session(handler) => Ok(handler),
        Resolution::Respond(_) => Err(DispatchError::ProtocolMisuse(
            "websocket route did not return a message handler",
        )),
    }
}
