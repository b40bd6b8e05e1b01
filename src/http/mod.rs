//! Connection adapter subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, upgrade detection)
//!     → plain request:  dispatch → response.rs (200 JSON or error status)
//!     → upgrade:        handshake → dispatch (verb `ws`) → websocket.rs session loop
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{dispatch_router, AppState, HttpServer};
