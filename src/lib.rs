//! Convention-based HTTP and WebSocket dispatcher.
//!
//! Routes are registered on a [`Dispatcher`] under `{verb}_{segment}` keys,
//! where the verb is the lower-cased HTTP method, `ws` for WebSocket
//! upgrades, or the `any` wildcard. A route may delegate the rest of the path
//! to another dispatcher, or hand a WebSocket connection to a long-lived
//! [`MessageHandler`].

pub mod config;
pub mod demo;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use dispatch::{Dispatcher, MessageHandler, Outbound, PublicRequest, Reply};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
