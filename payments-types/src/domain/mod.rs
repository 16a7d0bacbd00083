//! Domain models for the settlement orchestrator.

pub mod auth;
pub mod fiat;
pub mod outcome;
pub mod payment;
pub mod settlement;

pub use auth::{CHALLENGE_PREFIX, challenge_message};
pub use fiat::{IntentStatus, PaymentIntent, PaymentIntentRequest, to_minor_units};
pub use outcome::{PAYMENT_FAILED, PaymentOutcome};
pub use payment::{
    MAX_IDEMPOTENCY_KEY_LEN, PaymentId, PaymentRecord, PaymentRequest, PaymentStatus, PaymentUpdate,
    record_timestamp,
};
pub use settlement::{
    BuildRequest, Commitment, ConfirmationStatus, FeeParameters, Quote, QuoteRequest,
    SettlementInstruction, SettlementReceipt, SettlementStage, SignedInstruction,
    SlippageTolerance,
};
