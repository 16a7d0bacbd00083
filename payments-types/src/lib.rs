//! # Payments Types
//!
//! Domain types and port traits for the idempotent settlement orchestrator.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (PaymentRecord, Quote, PaymentIntent, SettlementReceipt)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain, repository, settlement and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    BuildRequest, CHALLENGE_PREFIX, Commitment, ConfirmationStatus, FeeParameters, IntentStatus,
    PAYMENT_FAILED, PaymentId, PaymentIntent, PaymentIntentRequest, PaymentOutcome, PaymentRecord,
    PaymentRequest, PaymentStatus, PaymentUpdate, Quote, QuoteRequest, SettlementInstruction,
    SettlementReceipt, SettlementStage, SignedInstruction, SlippageTolerance, challenge_message,
    record_timestamp, to_minor_units,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError, SettlementError};
pub use ports::{
    CacheError, FiatProcessor, IdempotencyCache, InstructionSigner, NetworkError,
    PaymentRecordStore, ProviderError, SettlementNetwork, SignerError, SwapProvider,
};
