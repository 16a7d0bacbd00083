//! Card-processor settlement model.
//!
//! A fiat payment is a single payment intent created and confirmed in one
//! call; there is no quote or signed instruction.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Charge request sent to the card processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Amount in the currency's minor unit (cents).
    pub amount_minor: i64,
    /// Lowercase ISO 4217 code.
    pub currency: String,
    pub payment_method: String,
    /// Forwarded to the processor so a repeated create returns the first intent.
    pub idempotency_key: String,
    pub order_id: String,
}

/// Processor-side state of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    /// Needs customer interaction (e.g. 3-D Secure) that a server-side
    /// confirmation cannot provide.
    RequiresAction,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
}

/// Converts a major-unit amount to minor units (two decimal places).
/// Returns `None` for finer precision or amounts that do not fit.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let minor = amount.checked_mul(Decimal::ONE_HUNDRED)?;
    if minor.fract() != Decimal::ZERO {
        return None;
    }
    minor.to_i64()
}
