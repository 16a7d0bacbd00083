//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use payments_types::{
    DomainError, PaymentId, PaymentRecord, PaymentRecordStore, PaymentUpdate, RepoError,
};

use crate::types::{DbPayment, PAYMENT_COLUMNS, map_sqlx_error};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

fn timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` opens its own database; keep one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema (idempotent).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        let ddl = include_str!("../migrations/0001_create_payments.sql");
        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<PaymentRecord>, RepoError> {
        let sql = format!("SELECT {} FROM payments WHERE {} = ?", PAYMENT_COLUMNS, column);
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPayment::into_domain).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRecordStore for SqliteRepo {
    async fn create(&self, record: PaymentRecord) -> Result<PaymentRecord, RepoError> {
        sqlx::query(
            r#"INSERT INTO payments
               (id, idempotency_key, payer_identity, order_id, amount, source_asset,
                destination_asset, status, external_transaction_id, out_amount, exchange_rate,
                price_impact_pct, tolerance_bps, failure_reason, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.idempotency_key)
        .bind(&record.payer_identity)
        .bind(&record.order_id)
        .bind(record.amount.to_string())
        .bind(&record.source_asset)
        .bind(&record.destination_asset)
        .bind(record.status.as_str())
        .bind(&record.external_transaction_id)
        .bind(record.out_amount.map(|d| d.to_string()))
        .bind(record.exchange_rate.map(|d| d.to_string()))
        .bind(record.price_impact_pct.map(|d| d.to_string()))
        .bind(record.tolerance_bps.map(i64::from))
        .bind(&record.failure_reason)
        .bind(timestamp(&record.created_at))
        .bind(timestamp(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(record)
    }

    async fn update(
        &self,
        id: PaymentId,
        update: PaymentUpdate,
    ) -> Result<PaymentRecord, RepoError> {
        let mut record = self.get(id).await?.ok_or(RepoError::NotFound)?;
        let previous = record.status;
        record.apply(update)?;

        // Guard on the status we read so a concurrent writer cannot be overwritten.
        let result = sqlx::query(
            r#"UPDATE payments
               SET status = ?, external_transaction_id = ?, out_amount = ?, exchange_rate = ?,
                   price_impact_pct = ?, tolerance_bps = ?, failure_reason = ?, updated_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(record.status.as_str())
        .bind(&record.external_transaction_id)
        .bind(record.out_amount.map(|d| d.to_string()))
        .bind(record.exchange_rate.map(|d| d.to_string()))
        .bind(record.price_impact_pct.map(|d| d.to_string()))
        .bind(record.tolerance_bps.map(i64::from))
        .bind(&record.failure_reason)
        .bind(timestamp(&record.updated_at))
        .bind(id.to_string())
        .bind(previous.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let current = self.get(id).await?.ok_or(RepoError::NotFound)?;
            return Err(RepoError::Domain(DomainError::InvalidTransition {
                from: current.status,
                to: record.status,
            }));
        }

        Ok(record)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>, RepoError> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        self.find_one("idempotency_key", key).await
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<PaymentRecord>, RepoError> {
        self.find_one("order_id", order_id).await
    }
}
