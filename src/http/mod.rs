//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body limit, tracing)
//!     → request.rs (decode JSON, validate, correlation ID)
//!     → [relay engine performs the outbound call]
//!     → response.rs (outcome → status, headers, bytes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::CorrelationId;
pub use server::{relay, HttpServer, HEALTH_PATH, RELAY_PATH};
