//! Request normalization.
//!
//! # Responsibilities
//! - Derive the dispatch verb (`ws` for upgrades, lower-cased method otherwise)
//! - Extract the route payload: decoded body when one is declared, query map otherwise
//!
//! # Design Decisions
//! - The body is read once; later hops receive a clone of the same payload
//! - Repeated query keys: last value wins
//! - Body codec chosen by content type: form → string map, `text/*` → string,
//!   anything else → JSON

use std::error::Error as StdError;

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Uri};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};

use crate::dispatch::types::{DispatchError, Payload, Verb};

/// Transport request as seen by the dispatcher.
pub struct Inbound {
    verb: Verb,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Body>,
    max_body_bytes: usize,
    payload: Option<Payload>,
}

impl Inbound {
    /// A plain HTTP request. The body is kept only if the headers declare one.
    pub fn http(request: Request<Body>, max_body_bytes: usize) -> Result<Self, DispatchError> {
        let (parts, body) = request.into_parts();
        let verb = Verb::from_method(&parts.method)?;
        let body = declares_body(&parts.headers).then_some(body);

        Ok(Self {
            verb,
            uri: parts.uri,
            headers: parts.headers,
            body,
            max_body_bytes,
            payload: None,
        })
    }

    /// An upgraded WebSocket request. Its payload is always the query map.
    pub fn websocket(parts: &Parts) -> Self {
        Self {
            verb: Verb::Ws,
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body: None,
            max_body_bytes: 0,
            payload: None,
        }
    }

    pub fn verb(&self) -> &Verb {
        &self.verb
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The route payload, decoded on first use.
    pub async fn payload(&mut self) -> Result<Payload, DispatchError> {
        if let Some(payload) = &self.payload {
            return Ok(payload.clone());
        }

        let payload = match self.body.take() {
            Some(body) => {
                let limit = self.max_body_bytes;
                let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
                    if exceeds_limit(&e) {
                        DispatchError::PayloadTooLarge(limit)
                    } else {
                        DispatchError::Decode(e.to_string())
                    }
                })?;
                if bytes.is_empty() {
                    query_map(self.uri.query())
                } else {
                    let content_type = self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
                    decode_body(content_type, &bytes)?
                }
            }
            None => query_map(self.uri.query()),
        };

        self.payload = Some(payload.clone());
        Ok(payload)
    }
}

fn exceeds_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Whether the request carries a body (`Content-Length > 0` or chunked).
pub fn declares_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

/// Build a string map from a URL query. Last value wins for repeated keys.
pub fn query_map(query: Option<&str>) -> Payload {
    form_map(query.unwrap_or_default().as_bytes())
}

fn form_map(input: &[u8]) -> Payload {
    let map: Map<String, Value> = url::form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    Value::Object(map)
}

/// Decode a request body according to its content type.
pub fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Payload, DispatchError> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if essence == "application/x-www-form-urlencoded" {
        return Ok(form_map(bytes));
    }

    if essence.starts_with("text/") {
        return String::from_utf8(bytes.to_vec())
            .map(Value::String)
            .map_err(|e| DispatchError::Decode(e.to_string()));
    }

    serde_json::from_slice(bytes).map_err(|e| DispatchError::Decode(e.to_string()))
}
