//! # Settlement Providers
//!
//! Outbound adapters used by the settlement executor:
//! - `retry` - HTTP client with bounded, safety-aware retry
//! - `swap` - quote and instruction-building provider
//! - `fiat` - card processor for fiat source assets
//! - `rpc` - settlement network (submit + confirmation status)
//! - `signer` - custodial Ed25519 key

pub mod fiat;
pub mod retry;
pub mod rpc;
pub mod signer;
pub mod swap;

pub use fiat::HttpFiatProcessor;
pub use retry::{FetchError, RetryPolicy, RetrySafety, RetryingClient};
pub use rpc::RpcNetwork;
pub use signer::Ed25519Signer;
pub use swap::HttpSwapProvider;
