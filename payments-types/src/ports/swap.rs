//! Swap provider port (quote + instruction builder).

use crate::domain::{BuildRequest, Quote, QuoteRequest, SettlementInstruction};

/// Error type for swap provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure or retries exhausted.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with an error envelope or a client error.
    #[error("Rejected by provider: {0}")]
    Rejected(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Port trait for the external rate-calculation and instruction-building API.
#[async_trait::async_trait]
pub trait SwapProvider: Send + Sync {
    /// Prices `req.amount` of the input asset in the output asset.
    async fn quote(&self, req: &QuoteRequest) -> Result<Quote, ProviderError>;

    /// Builds an unsigned settlement instruction bound to a quote.
    async fn build(&self, req: &BuildRequest) -> Result<SettlementInstruction, ProviderError>;
}
