//! Route table and lookup.
//!
//! # Responsibilities
//! - Store handlers under `{verb}_{segment}` keys, registered explicitly
//! - Resolve a verb + leading segment to a handler
//! - Fall back to the `any` verb when the exact verb has no handler
//!
//! # Design Decisions
//! - Built once, immutable while serving (shared via `Arc`)
//! - Matching is exact: no case folding of segments
//! - Handlers capture the state they need, which is how a route reaches
//!   "its" dispatcher's data

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::dispatch::session::MessageHandler;
use crate::dispatch::types::{HandlerError, Payload, PublicRequest, Reply, RouteKey, Verb};

/// Future returned by a route.
pub type RouteFuture = BoxFuture<'static, Result<Reply, HandlerError>>;

/// Type-erased route handler.
pub type Route = Arc<dyn Fn(Payload, PublicRequest) -> RouteFuture + Send + Sync>;

/// Maps `(verb, segment)` keys to route handlers.
///
/// Cloning is cheap; the table is shared.
#[derive(Clone)]
pub struct Dispatcher {
    name: Cow<'static, str>,
    routes: Arc<HashMap<RouteKey, Route>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::named("root")
    }

    /// Create an empty dispatcher with a name used in logs.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            routes: Arc::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `handler` under `{verb}_{segment}`.
    ///
    /// Use the empty segment for the root of this dispatcher. Registering
    /// the same key twice replaces the earlier handler.
    pub fn route<F, Fut>(mut self, verb: Verb, segment: &str, handler: F) -> Self
    where
        F: Fn(Payload, PublicRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        let key = RouteKey::new(&verb, segment);
        let route: Route = Arc::new(move |payload: Payload, request: PublicRequest| -> RouteFuture {
            Box::pin(handler(payload, request))
        });

        if Arc::make_mut(&mut self.routes).insert(key.clone(), route).is_some() {
            tracing::warn!(dispatcher = %self.name, route = %key, "Route replaced");
        }
        self
    }

    pub fn get<F, Fut>(self, segment: &str, handler: F) -> Self
    where
        F: Fn(Payload, PublicRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        self.route(Verb::Get, segment, handler)
    }

    pub fn post<F, Fut>(self, segment: &str, handler: F) -> Self
    where
        F: Fn(Payload, PublicRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        self.route(Verb::Post, segment, handler)
    }

    pub fn put<F, Fut>(self, segment: &str, handler: F) -> Self
    where
        F: Fn(Payload, PublicRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        self.route(Verb::Put, segment, handler)
    }

    pub fn delete<F, Fut>(self, segment: &str, handler: F) -> Self
    where
        F: Fn(Payload, PublicRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        self.route(Verb::Delete, segment, handler)
    }

    /// Register a WebSocket route.
    pub fn ws<F, Fut>(self, segment: &str, handler: F) -> Self
    where
        F: Fn(Payload, PublicRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        self.route(Verb::Ws, segment, handler)
    }

    /// Register a wildcard route, used when the exact verb has none.
    pub fn any<F, Fut>(self, segment: &str, handler: F) -> Self
    where
        F: Fn(Payload, PublicRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        self.route(Verb::Any, segment, handler)
    }

    /// Register a WebSocket route that builds a fresh handler per connection.
    pub fn ws_session<F, H>(self, segment: &str, factory: F) -> Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: MessageHandler,
    {
        self.ws(segment, move |_, _| {
            let handler = factory();
            async move { Ok(Reply::session(handler)) }
        })
    }

    /// Resolve a handler for `verb` and the leading `segment`.
    ///
    /// Tries `{verb}_{segment}`, then `any_{segment}`.
    pub fn lookup(&self, verb: &Verb, segment: &str) -> Option<(RouteKey, Route)> {
        [verb, &Verb::Any].into_iter().find_map(|verb| {
            let key = RouteKey::new(verb, segment);
            self.routes.get(&key).map(|route| (key, route.clone()))
        })
    }

    /// Registered keys, sorted.
    pub fn route_keys(&self) -> Vec<&RouteKey> {
        let mut keys: Vec<&RouteKey> = self.routes.keys().collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        keys
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("routes", &self.route_keys())
            .finish()
    }
}
