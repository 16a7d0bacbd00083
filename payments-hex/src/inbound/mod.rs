//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer.

pub mod handlers;
mod rate_limit;
mod server;

pub use handlers::IDEMPOTENCY_KEY_HEADER;
pub use rate_limit::RateLimiterState;
pub use server::HttpServer;
