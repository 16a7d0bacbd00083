//! Data Transfer Objects (DTOs) for requests and responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /payments`.
///
/// Unknown fields are rejected so mistyped keys never reach the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePaymentRequest {
    /// Base58 Ed25519 public key of the payer
    #[schema(example = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin")]
    pub payer_identity: String,
    /// Base58 detached signature over the challenge message
    pub signed_message: String,
    /// Nonce embedded in the challenge message
    #[schema(example = "c0ffee-1700000000")]
    pub nonce: String,
    /// Caller's order reference; unique per payment
    #[schema(example = "order-42")]
    pub order_id: String,
    /// Amount of `source_asset` to settle
    #[schema(value_type = String, example = "100")]
    pub amount: Decimal,
    #[schema(example = "USDC")]
    pub source_asset: String,
    #[schema(example = "SOL")]
    pub destination_asset: String,
    /// Card processor payment method; required when `source_asset` is a
    /// fiat currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "pm_card_visa")]
    pub payment_method: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Error body returned for every non-200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Payment failed")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
