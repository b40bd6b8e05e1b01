//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the Axum router that sends every request to the dispatcher
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Hand WebSocket upgrades to the session layer
//! - Render plain resolutions as JSON
//! - Bind server to listener with graceful shutdown

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::dispatch::{engine, Dispatcher, Inbound};
use crate::http::request::{is_websocket_upgrade, request_id};
use crate::http::{response, websocket};
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub max_hops: usize,
    pub max_body_bytes: usize,
}

/// Build a router that serves `dispatcher` on every path.
///
/// Can be served directly or nested into a larger Axum application.
#[allow(deprecated)]
pub fn dispatch_router(dispatcher: Dispatcher, config: &ServerConfig) -> Router {
    let state = AppState {
        dispatcher,
        max_hops: config.dispatch.max_hops,
        max_body_bytes: config.dispatch.max_body_bytes,
    };

    Router::new()
        .fallback(dispatch_handler)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.dispatch.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
}

/// HTTP/WebSocket server for a dispatcher tree.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new server with the given configuration and root dispatcher.
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        tracing::debug!(
            dispatcher = %dispatcher.name(),
            routes = ?dispatcher.route_keys(),
            "Root dispatcher registered"
        );

        let router = dispatch_router(dispatcher, &config);
        Self { router }
    }

    /// Run the server until `shutdown_rx` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Entry point for every request.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers());

    if is_websocket_upgrade(request.headers()) {
        let (mut parts, _) = request.into_parts();
        return match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(ws) => websocket::upgrade(ws, state, parts, request_id),
            Err(rejection) => {
                tracing::warn!(
                    request_id = %request_id,
                    path = %parts.uri.path(),
                    error = %rejection,
                    "Rejected WebSocket upgrade"
                );
                rejection.into_response()
            }
        };
    }

    let start = Instant::now();
    let path = request.uri().path().to_string();

    let (verb, result) = match Inbound::http(request, state.max_body_bytes) {
        Ok(inbound) => {
            let verb = inbound.verb().to_string();
            tracing::debug!(request_id = %request_id, verb = %verb, path = %path, "Dispatching request");
            (verb, engine::dispatch_http(&state.dispatcher, inbound, state.max_hops).await)
        }
        Err(e) => ("unsupported".to_string(), Err(e)),
    };

    match result {
        Ok(value) => {
            metrics::record_dispatch(&verb, "response", start);
            response::json(value)
        }
        Err(e) => {
            metrics::record_dispatch(&verb, e.kind(), start);
            if response::status_for(&e).is_client_error() {
                tracing::warn!(request_id = %request_id, path = %path, error = %e, "Request rejected");
            } else {
                tracing::error!(request_id = %request_id, path = %path, error = %e, "Request failed");
            }
            response::error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Reply;
    use crate::config::DispatchConfig;
    use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let dispatcher = Dispatcher::new()
            .get("", |_, _| async { Reply::json("Hello World!") })
            .any("echo", |payload, _| async move { Ok(Reply::Json(payload)) })
            .get("ct", |_, req| async move { Reply::json(req.header("content-type")) });
        dispatch_router(dispatcher, &ServerConfig::default())
    }

    async fn send(request: Request<Body>) -> (StatusCode, Response) {
        let response = router().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_hello_world() {
        let (status, response) = send(Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_json(response).await, json!("Hello World!"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (status, response) = send(Request::get("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "no_route");
    }

    #[tokio::test]
    async fn test_bad_body() {
        let request = Request::post("/echo")
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, 3)
            .body(Body::from("{x:"))
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reserved_verb_methods_are_rejected() {
        let ws = Method::from_bytes(b"WS").unwrap();
        let request = Request::builder().method(ws).uri("/").body(Body::empty()).unwrap();
        let (status, response) = send(request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["error"], "unsupported_method");
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit() {
        let config = ServerConfig {
            dispatch: DispatchConfig {
                max_body_bytes: 8,
                ..DispatchConfig::default()
            },
            ..ServerConfig::default()
        };
        let dispatcher = Dispatcher::new().any("echo", |payload, _| async move { Ok(Reply::Json(payload)) });
        let request = Request::post("/echo")
            .header(CONTENT_TYPE, "application/json")
            .header(TRANSFER_ENCODING, "chunked")
            .body(Body::from(r#"{"ping":"much too long"}"#))
            .unwrap();

        let response = dispatch_router(dispatcher, &config).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_headers_reach_routes() {
        let request = Request::get("/ct")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();
        let (status, response) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_json(response).await, json!("application/json"));
    }

    #[tokio::test]
    async fn test_upgrade_without_handshake_headers_is_rejected() {
        let request = Request::get("/")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(request).await;
        assert!(status.is_client_error());
    }
}
