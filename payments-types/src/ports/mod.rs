//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod cache;
mod fiat;
mod network;
mod repository;
mod signer;
mod swap;

pub use cache::{CacheError, IdempotencyCache};
pub use fiat::FiatProcessor;
pub use network::{NetworkError, SettlementNetwork};
pub use repository::PaymentRecordStore;
pub use signer::{InstructionSigner, SignerError};
pub use swap::{ProviderError, SwapProvider};
