//! Shared database types with feature-gated fields for SQLite and PostgreSQL.

use sqlx::FromRow;

use payments_types::{DomainError, PaymentId, PaymentRecord, PaymentStatus, RepoError};

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
#[cfg(not(feature = "sqlite"))]
use rust_decimal::Decimal;
#[cfg(not(feature = "sqlite"))]
use uuid::Uuid;

/// Column list shared by every SELECT on `payments`.
pub const PAYMENT_COLUMNS: &str = "id, idempotency_key, payer_identity, order_id, amount, \
     source_asset, destination_asset, status, external_transaction_id, out_amount, \
     exchange_rate, price_impact_pct, tolerance_bps, failure_reason, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Payment row from database.
#[derive(FromRow)]
pub struct DbPayment {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub idempotency_key: String,
    pub payer_identity: String,
    pub order_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub amount: Decimal,
    #[cfg(feature = "sqlite")]
    pub amount: String,

    pub source_asset: String,
    pub destination_asset: String,
    pub status: String,
    pub external_transaction_id: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub out_amount: Option<Decimal>,
    #[cfg(feature = "sqlite")]
    pub out_amount: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub exchange_rate: Option<Decimal>,
    #[cfg(feature = "sqlite")]
    pub exchange_rate: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub price_impact_pct: Option<Decimal>,
    #[cfg(feature = "sqlite")]
    pub price_impact_pct: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub tolerance_bps: Option<i32>,
    #[cfg(feature = "sqlite")]
    pub tolerance_bps: Option<i64>,

    pub failure_reason: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub updated_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub updated_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_status(s: &str) -> Result<PaymentStatus, RepoError> {
    s.parse()
        .map_err(|e: DomainError| RepoError::Database(e.to_string()))
}

pub fn parse_tolerance(value: Option<i64>) -> Result<Option<u32>, RepoError> {
    value
        .map(|bps| {
            u32::try_from(bps)
                .map_err(|_| RepoError::Database(format!("Invalid tolerance_bps: {}", bps)))
        })
        .transpose()
}

#[cfg(feature = "sqlite")]
fn parse_decimal(s: &str) -> Result<rust_decimal::Decimal, RepoError> {
    s.parse()
        .map_err(|e| RepoError::Database(format!("Invalid decimal {}: {}", s, e)))
}

#[cfg(feature = "sqlite")]
fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    Ok(chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| RepoError::Database(e.to_string()))?
        .with_timezone(&chrono::Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain conversion (feature-gated implementations)
// ─────────────────────────────────────────────────────────────────────────────

impl DbPayment {
    /// Convert database row to domain PaymentRecord.
    pub fn into_domain(self) -> Result<PaymentRecord, RepoError> {
        let status = parse_status(&self.status)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, amount, out_amount, exchange_rate, price_impact_pct, tolerance_bps, created_at, updated_at) = (
            PaymentId::from_uuid(self.id),
            self.amount,
            self.out_amount,
            self.exchange_rate,
            self.price_impact_pct,
            parse_tolerance(self.tolerance_bps.map(i64::from))?,
            self.created_at,
            self.updated_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, amount, out_amount, exchange_rate, price_impact_pct, tolerance_bps, created_at, updated_at) = {
            let uuid =
                uuid::Uuid::parse_str(&self.id).map_err(|e| RepoError::Database(e.to_string()))?;
            (
                PaymentId::from_uuid(uuid),
                parse_decimal(&self.amount)?,
                self.out_amount.as_deref().map(parse_decimal).transpose()?,
                self.exchange_rate.as_deref().map(parse_decimal).transpose()?,
                self.price_impact_pct.as_deref().map(parse_decimal).transpose()?,
                parse_tolerance(self.tolerance_bps)?,
                parse_timestamp(&self.created_at)?,
                parse_timestamp(&self.updated_at)?,
            )
        };

        Ok(PaymentRecord {
            id,
            idempotency_key: self.idempotency_key,
            payer_identity: self.payer_identity,
            order_id: self.order_id,
            amount,
            source_asset: self.source_asset,
            destination_asset: self.destination_asset,
            status,
            external_transaction_id: self.external_transaction_id,
            out_amount,
            exchange_rate,
            price_impact_pct,
            tolerance_bps,
            failure_reason: self.failure_reason,
            created_at,
            updated_at,
        })
    }
}

/// Maps a sqlx error, surfacing unique-constraint violations as duplicates.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return RepoError::DuplicateKey(db_err.message().to_string());
        }
    }
    RepoError::Database(err.to_string())
}
