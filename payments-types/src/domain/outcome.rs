//! Terminal result of a payment, as cached under its idempotency key.

use serde::{Deserialize, Serialize};

use super::payment::{PaymentRecord, PaymentStatus};

/// Error label returned to callers for every failed settlement.
pub const PAYMENT_FAILED: &str = "Payment failed";

/// A terminal answer for one idempotency key.
///
/// Both variants are valid idempotent outcomes: a permanently failed
/// attempt is replayed exactly like a completed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Completed {
        payment: PaymentRecord,
    },
    Failed {
        payment: PaymentRecord,
        error: String,
        details: String,
    },
}

impl PaymentOutcome {
    /// Derives the outcome from a stored record; `None` while still in flight.
    pub fn from_record(payment: PaymentRecord) -> Option<Self> {
        match payment.status {
            PaymentStatus::Completed | PaymentStatus::Refunded => {
                Some(PaymentOutcome::Completed { payment })
            }
            PaymentStatus::Failed => {
                let details = payment
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "settlement failed".to_string());
                Some(PaymentOutcome::Failed {
                    payment,
                    error: PAYMENT_FAILED.to_string(),
                    details,
                })
            }
            PaymentStatus::Pending | PaymentStatus::Processing => None,
        }
    }

    pub fn payment(&self) -> &PaymentRecord {
        match self {
            PaymentOutcome::Completed { payment } | PaymentOutcome::Failed { payment, .. } => {
                payment
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentOutcome::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentRequest, PaymentUpdate};
    use crate::dto::CreatePaymentRequest;
    use crate::error::SettlementError;
    use rust_decimal::Decimal;

    fn record() -> PaymentRecord {
        let req = PaymentRequest::new(
            "key",
            CreatePaymentRequest {
                payer_identity: "payer".into(),
                signed_message: "sig".into(),
                nonce: "n".into(),
                order_id: "order".into(),
                amount: Decimal::from(5),
                source_asset: "USDC".into(),
                destination_asset: "SOL".into(),
                payment_method: None,
            },
        )
        .unwrap();
        PaymentRecord::processing(&req)
    }

    #[test]
    fn test_processing_record_has_no_outcome() {
        assert!(PaymentOutcome::from_record(record()).is_none());
    }

    #[test]
    fn test_failed_record_carries_reason_as_details() {
        let mut rec = record();
        rec.apply(PaymentUpdate::failed(&SettlementError::BuildFailed(
            "quote expired".into(),
        )))
        .unwrap();

        match PaymentOutcome::from_record(rec).unwrap() {
            PaymentOutcome::Failed { error, details, .. } => {
                assert_eq!(error, PAYMENT_FAILED);
                assert!(details.contains("quote expired"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_serialized_outcome_is_stable() {
        let outcome = PaymentOutcome::from_record({
            let mut rec = record();
            rec.apply(PaymentUpdate::failed(&SettlementError::QuoteUnavailable(
                "down".into(),
            )))
            .unwrap();
            rec
        })
        .unwrap();

        let first = serde_json::to_string(&outcome).unwrap();
        let decoded: PaymentOutcome = serde_json::from_str(&first).unwrap();
        assert_eq!(serde_json::to_string(&decoded).unwrap(), first);
    }
}
