//! Custodial signer port.

use crate::domain::{SettlementInstruction, SignedInstruction};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Malformed instruction: {0}")]
    MalformedInstruction(String),
}

/// The orchestrator's own signing key. Pure and safe for concurrent use.
pub trait InstructionSigner: Send + Sync {
    /// Public identity of the custodial key.
    fn identity(&self) -> String;

    fn sign(&self, instruction: &SettlementInstruction) -> Result<SignedInstruction, SignerError>;
}
