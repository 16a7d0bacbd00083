//! Card processor port.

use crate::domain::{PaymentIntent, PaymentIntentRequest};

use super::swap::ProviderError;

/// Port trait for a payment-intent style card processor.
#[async_trait::async_trait]
pub trait FiatProcessor: Send + Sync {
    /// Creates and confirms an intent. Repeating the call with the same
    /// `idempotency_key` must return the original intent.
    async fn create_intent(&self, req: &PaymentIntentRequest)
    -> Result<PaymentIntent, ProviderError>;

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, ProviderError>;
}
