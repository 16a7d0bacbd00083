//! # Payments Hex
//!
//! Settlement orchestration core and HTTP adapter.
//!
//! ## Architecture
//!
//! - `auth` - Wallet signature verification
//! - `tolerance` - Dynamic slippage tolerance from a reference quote
//! - `executor` - Quote → build → sign → submit → confirm state machine
//! - `service` - Idempotent orchestration over the record store and cache
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `R: PaymentRecordStore` and
//! `C: IdempotencyCache`; outbound providers are injected as trait objects.

pub mod auth;
pub mod executor;
pub mod inbound;
pub mod openapi;
pub mod service;
pub mod tolerance;

#[cfg(test)]
mod fakes;
#[cfg(test)]
mod service_tests;

pub use auth::verify_wallet_signature;
pub use executor::{ExecutorConfig, SettlementExecutor};
pub use service::{PaymentService, ServiceConfig};
pub use tolerance::{ToleranceCalculator, ToleranceConfig};
