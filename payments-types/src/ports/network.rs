//! Settlement network port.

use crate::domain::{Commitment, ConfirmationStatus, SignedInstruction};

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Rejected by network: {0}")]
    Rejected(String),

    #[error("Network unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed network response: {0}")]
    Malformed(String),
}

/// Submit-and-confirm primitive of the settlement network.
#[async_trait::async_trait]
pub trait SettlementNetwork: Send + Sync {
    /// Submits a signed instruction with preflight validation enabled.
    /// Side-effecting: callers must not retry it blindly.
    async fn submit(
        &self,
        instruction: &SignedInstruction,
        commitment: Commitment,
    ) -> Result<String, NetworkError>;

    /// Id `instruction` will be known by once submitted, if it can be derived
    /// without asking the network.
    fn transaction_id(&self, _instruction: &SignedInstruction) -> Option<String> {
        None
    }

    /// Reads the confirmation status of a submitted transaction.
    async fn status(&self, transaction_id: &str) -> Result<ConfirmationStatus, NetworkError>;
}
