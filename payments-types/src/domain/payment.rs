//! Payment request and payment record domain model.

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::settlement::SettlementReceipt;
use crate::dto::CreatePaymentRequest;
use crate::error::{DomainError, SettlementError};

/// Upper bound on caller-supplied idempotency keys.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Unique identifier for a PaymentRecord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, format = Uuid)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a payment.
///
/// Records are created in `Processing` and move exactly once to
/// `Completed` or `Failed`. `Refunded` is only reachable from `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// True once settlement has produced a final answer for the caller.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    }

    /// The only status a record may hold immediately before moving to `self`.
    pub fn required_predecessor(&self) -> Option<PaymentStatus> {
        match self {
            PaymentStatus::Pending => None,
            PaymentStatus::Processing => Some(PaymentStatus::Pending),
            PaymentStatus::Completed | PaymentStatus::Failed => Some(PaymentStatus::Processing),
            PaymentStatus::Refunded => Some(PaymentStatus::Completed),
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        next.required_predecessor() == Some(*self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(DomainError::ValidationError(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// A validated, immutable payment request.
///
/// Credentials (`signed_message`, `nonce`) are carried through untouched;
/// the signature verifier decides whether they are acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub idempotency_key: String,
    pub payer_identity: String,
    pub order_id: String,
    pub amount: Decimal,
    pub source_asset: String,
    pub destination_asset: String,
    pub signed_message: String,
    pub nonce: String,
    pub payment_method: Option<String>,
}

impl PaymentRequest {
    /// Validates an inbound body against the idempotency key it arrived with.
    pub fn new(idempotency_key: &str, body: CreatePaymentRequest) -> Result<Self, DomainError> {
        let idempotency_key = idempotency_key.trim();
        if idempotency_key.is_empty() {
            return Err(DomainError::MissingIdempotencyKey);
        }
        if idempotency_key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(DomainError::ValidationError(format!(
                "Idempotency-Key must be at most {} characters",
                MAX_IDEMPOTENCY_KEY_LEN
            )));
        }
        if body.amount <= Decimal::ZERO {
            return Err(DomainError::NonPositiveAmount);
        }

        let order_id = required("orderId", body.order_id)?;
        let source_asset = required("sourceAsset", body.source_asset)?;
        let destination_asset = required("destinationAsset", body.destination_asset)?;
        if source_asset == destination_asset {
            return Err(DomainError::ValidationError(
                "sourceAsset and destinationAsset must differ".into(),
            ));
        }

        Ok(Self {
            idempotency_key: idempotency_key.to_string(),
            payer_identity: body.payer_identity,
            order_id,
            amount: body.amount,
            source_asset,
            destination_asset,
            signed_message: body.signed_message,
            nonce: body.nonce,
            payment_method: body
                .payment_method
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
        })
    }
}

fn required(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Current time at the precision the record stores keep (microseconds).
pub fn record_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Durable record of one payment's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: PaymentId,
    #[schema(example = "order-42-attempt-1")]
    pub idempotency_key: String,
    pub payer_identity: String,
    #[schema(example = "order-42")]
    pub order_id: String,
    #[schema(value_type = String, example = "100")]
    pub amount: Decimal,
    #[schema(example = "USDC")]
    pub source_asset: String,
    #[schema(example = "SOL")]
    pub destination_asset: String,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub out_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub price_impact_pct: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_bps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates the initial `processing` record for an accepted request.
    pub fn processing(req: &PaymentRequest) -> Self {
        let now = record_timestamp();
        Self {
            id: PaymentId::new(),
            idempotency_key: req.idempotency_key.clone(),
            payer_identity: req.payer_identity.clone(),
            order_id: req.order_id.clone(),
            amount: req.amount,
            source_asset: req.source_asset.clone(),
            destination_asset: req.destination_asset.clone(),
            status: PaymentStatus::Processing,
            external_transaction_id: None,
            out_amount: None,
            exchange_rate: None,
            price_impact_pct: None,
            tolerance_bps: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an update, enforcing the status transition rules.
    pub fn apply(&mut self, update: PaymentUpdate) -> Result<(), DomainError> {
        if !self.status.can_transition_to(update.status) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: update.status,
            });
        }
        self.status = update.status;
        if update.external_transaction_id.is_some() {
            self.external_transaction_id = update.external_transaction_id;
        }
        if let Some(receipt) = update.receipt {
            self.out_amount = Some(receipt.out_amount);
            self.exchange_rate = Some(receipt.exchange_rate);
            self.price_impact_pct = Some(receipt.price_impact_pct);
            self.tolerance_bps = Some(receipt.tolerance_bps);
        }
        if update.failure_reason.is_some() {
            self.failure_reason = update.failure_reason;
        }
        self.updated_at = update.updated_at;
        Ok(())
    }
}

/// Fields changed when a payment leaves `processing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub receipt: Option<SettlementReceipt>,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentUpdate {
    pub fn completed(receipt: SettlementReceipt) -> Self {
        Self {
            status: PaymentStatus::Completed,
            external_transaction_id: Some(receipt.external_transaction_id.clone()),
            receipt: Some(receipt),
            failure_reason: None,
            updated_at: record_timestamp(),
        }
    }

    /// An attempt that ended without a settlement result, e.g. a crashed task.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            external_transaction_id: None,
            receipt: None,
            failure_reason: Some(format!("Settlement aborted: {}", reason.into())),
            updated_at: record_timestamp(),
        }
    }

    pub fn failed(error: &SettlementError) -> Self {
        Self {
            status: PaymentStatus::Failed,
            external_transaction_id: error.transaction_id().map(str::to_string),
            receipt: None,
            failure_reason: Some(error.to_string()),
            updated_at: record_timestamp(),
        }
    }
}
