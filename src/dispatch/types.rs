//! Core dispatch types and error definitions.

use std::collections::VecDeque;
use std::fmt;

use axum::http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::dispatch::session::MessageHandler;
use crate::dispatch::table::Dispatcher;

/// Payload handed to every route: the decoded body, or the query map.
pub type Payload = Value;

/// Verb half of a route key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// WebSocket upgrade requests.
    Ws,
    /// Wildcard, tried after the exact verb.
    Any,
    /// Any other HTTP method, lower-cased. Never `ws` or `any`.
    Other(String),
}

impl Verb {
    /// Map an HTTP method to its lower-cased verb.
    ///
    /// Methods spelled like the reserved `ws` and `any` verbs are rejected.
    pub fn from_method(method: &Method) -> Result<Self, DispatchError> {
        let verb = match *method {
            Method::GET => Verb::Get,
            Method::POST => Verb::Post,
            Method::PUT => Verb::Put,
            Method::PATCH => Verb::Patch,
            Method::DELETE => Verb::Delete,
            Method::HEAD => Verb::Head,
            Method::OPTIONS => Verb::Options,
            _ => {
                let name = method.as_str().to_lowercase();
                if name == Verb::Ws.as_str() || name == Verb::Any.as_str() {
                    return Err(DispatchError::UnsupportedMethod(method.to_string()));
                }
                Verb::Other(name)
            }
        };
        Ok(verb)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::Head => "head",
            Verb::Options => "options",
            Verb::Ws => "ws",
            Verb::Any => "any",
            Verb::Other(verb) => verb,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route table key, `{verb}_{segment}`.
///
/// Root handlers use the empty segment, so their key ends in `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(verb: &Verb, segment: &str) -> Self {
        Self(format!("{}_{}", verb, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request view passed to every route.
///
/// Holds the path segments not yet consumed by the dispatcher chain and the
/// original headers. A route that delegates may consume further segments
/// (e.g. a parameter) before handing the view back in [`Reply::Delegate`].
#[derive(Debug, Clone)]
pub struct PublicRequest {
    path: VecDeque<String>,
    headers: HeaderMap,
}

impl PublicRequest {
    pub fn new(path: Vec<String>, headers: HeaderMap) -> Self {
        Self {
            path: path.into(),
            headers,
        }
    }

    /// Remaining path segments, in order.
    pub fn path(&self) -> impl Iterator<Item = &str> {
        self.path.iter().map(String::as_str)
    }

    /// The next unconsumed segment, if any.
    pub fn peek_segment(&self) -> Option<&str> {
        self.path.front().map(String::as_str)
    }

    /// Consume and return the next segment.
    pub fn next_segment(&mut self) -> Option<String> {
        self.path.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.path.len()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Substitute the root segment when the path has been fully consumed.
    pub(crate) fn ensure_root_segment(&mut self) {
        if self.path.is_empty() {
            self.path.push_back(String::new());
        }
    }
}

/// Value returned by a route.
pub enum Reply {
    /// Terminal JSON response.
    Json(Value),
    /// Terminal response without content (rendered as `null`).
    Empty,
    /// Terminal WebSocket handoff.
    Session(Box<dyn MessageHandler>),
    /// Continue resolution against another dispatcher.
    Delegate {
        dispatcher: Dispatcher,
        request: PublicRequest,
    },
}

impl Reply {
    /// Serialize `value` into a JSON reply.
    pub fn json<T: Serialize>(value: T) -> Result<Self, HandlerError> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }

    pub fn session(handler: impl MessageHandler) -> Self {
        Reply::Session(Box::new(handler))
    }

    pub fn delegate(dispatcher: Dispatcher, request: PublicRequest) -> Self {
        Reply::Delegate {
            dispatcher,
            request,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Json(_) => "json",
            Reply::Empty => "empty",
            Reply::Session(_) => "session",
            Reply::Delegate { .. } => "delegate",
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Reply::Empty => f.write_str("Empty"),
            Reply::Session(_) => f.write_str("Session(..)"),
            Reply::Delegate { dispatcher, request } => f
                .debug_struct("Delegate")
                .field("dispatcher", dispatcher)
                .field("request", request)
                .finish(),
        }
    }
}

/// Deserialize a route payload into a typed value.
pub fn parse_payload<T: DeserializeOwned>(payload: Payload) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(payload)?)
}

/// Failure raised by a route or message handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    /// Payload could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Errors surfaced by dispatch to the connection boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No exact or wildcard route key matched.
    #[error("no route for {verb} /{segment}")]
    NoRoute { verb: String, segment: String },

    /// The request body could not be decoded.
    #[error("failed to decode request body: {0}")]
    Decode(String),

    /// The request body exceeded the configured limit.
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// The HTTP method collides with a reserved verb.
    #[error("method {0} is not supported")]
    UnsupportedMethod(String),

    /// A route rejected.
    #[error("route failed: {0}")]
    Handler(#[from] HandlerError),

    /// A route returned a result the transport cannot carry.
    #[error("protocol misuse: {0}")]
    ProtocolMisuse(&'static str),

    /// Delegation chain did not terminate.
    #[error("delegation exceeded {0} hops")]
    TooManyHops(usize),
}

impl DispatchError {
    /// Outcome label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NoRoute { .. } => "no_route",
            DispatchError::Decode(_) => "decode_failure",
            DispatchError::PayloadTooLarge(_) => "payload_too_large",
            DispatchError::UnsupportedMethod(_) => "unsupported_method",
            DispatchError::Handler(_) => "handler_failure",
            DispatchError::ProtocolMisuse(_) => "protocol_misuse",
            DispatchError::TooManyHops(_) => "too_many_hops",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_keys() {
        assert_eq!(RouteKey::new(&Verb::Get, "").as_str(), "get_");
        assert_eq!(RouteKey::new(&Verb::Ws, "listen").as_str(), "ws_listen");
        assert_eq!(RouteKey::new(&Verb::Any, "echo").as_str(), "any_echo");
    }

    #[test]
    fn test_verb_from_method() {
        assert_eq!(Verb::from_method(&Method::PUT).unwrap(), Verb::Put);
        assert_eq!(Verb::from_method(&Method::GET).unwrap().as_str(), "get");

        let purge = Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(Verb::from_method(&purge).unwrap().as_str(), "purge");
    }

    #[test]
    fn test_reserved_verbs_are_not_methods() {
        for name in [&b"WS"[..], b"ws", b"ANY", b"Any"] {
            let method = Method::from_bytes(name).unwrap();
            let err = Verb::from_method(&method).unwrap_err();
            assert!(matches!(err, DispatchError::UnsupportedMethod(_)));
        }
    }

    #[test]
    fn test_public_request_consumption() {
        let mut req = PublicRequest::new(vec!["hop".into(), "gato".into()], HeaderMap::new());
        assert_eq!(req.peek_segment(), Some("hop"));
        assert_eq!(req.next_segment().as_deref(), Some("hop"));
        assert_eq!(req.path().collect::<Vec<_>>(), vec!["gato"]);
        assert_eq!(req.next_segment().as_deref(), Some("gato"));
        assert_eq!(req.remaining(), 0);

        req.ensure_root_segment();
        assert_eq!(req.peek_segment(), Some(""));
    }

    #[test]
    fn test_parse_payload() {
        #[derive(Debug, serde::Deserialize)]
        struct PingPong {
            ping: String,
        }

        let parsed: PingPong = parse_payload(serde_json::json!({ "ping": "hello" })).unwrap();
        assert_eq!(parsed.ping, "hello");

        let err = parse_payload::<PingPong>(serde_json::json!(42)).unwrap_err();
        assert!(matches!(err, HandlerError::Json(_)));
    }
}
