//! Error types for the settlement orchestrator.

use crate::domain::{PaymentStatus, SettlementStage};

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Idempotency-Key is required")]
    MissingIdempotencyKey,

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("{0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Entity not found")]
    NotFound,
}

/// Fatal failure of one settlement attempt.
///
/// The display text is what ends up in `failureReason` and in the
/// `details` of the cached failure response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    /// `transaction_id` is the id the instruction would land under, when the
    /// network can derive it locally; a failed submit may still have landed.
    #[error("Submission failed: {reason}")]
    SubmissionFailed {
        reason: String,
        transaction_id: Option<String>,
    },

    #[error("Confirmation timeout: transaction {transaction_id} not confirmed after {waited_secs}s")]
    ConfirmationTimeout {
        transaction_id: String,
        waited_secs: u64,
    },
}

impl SettlementError {
    /// Stage the attempt had reached when it failed.
    pub fn stage(&self) -> SettlementStage {
        match self {
            SettlementError::QuoteUnavailable(_) => SettlementStage::Created,
            SettlementError::BuildFailed(_) => SettlementStage::QuoteRequested,
            SettlementError::Signing(_) => SettlementStage::TransactionBuilt,
            SettlementError::SubmissionFailed { .. } | SettlementError::ConfirmationTimeout { .. } => {
                SettlementStage::Signed
            }
        }
    }

    /// Transaction id known to the network, if the instruction was accepted.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            SettlementError::ConfirmationTimeout { transaction_id, .. } => Some(transaction_id),
            SettlementError::SubmissionFailed { transaction_id, .. } => transaction_id.as_deref(),
            _ => None,
        }
    }

    /// Programmer/invariant errors as opposed to provider failures.
    pub fn is_internal(&self) -> bool {
        matches!(self, SettlementError::Signing(_))
    }
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { .. } => AppError::Internal(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::DuplicateKey(e) => AppError::Conflict(e),
            RepoError::NotFound => AppError::Internal("Payment record not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
        }
    }
}
