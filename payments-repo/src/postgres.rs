//! PostgreSQL repository adapter.

use async_trait::async_trait;
use sqlx::PgPool;

use payments_types::{PaymentId, PaymentRecord, PaymentRecordStore, PaymentUpdate, RepoError};

use crate::types::{DbPayment, PAYMENT_COLUMNS, map_sqlx_error};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with row-level locking.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_payments_pg.sql"),
        "0001",
    )
    .await
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<PaymentRecord>, RepoError> {
        let sql = format!("SELECT {} FROM payments WHERE {} = $1", PAYMENT_COLUMNS, column);
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
impl PaymentRecordStore for PostgresRepo {
    async fn create(&self, record: PaymentRecord) -> Result<PaymentRecord, RepoError> {
        sqlx::query(
            r#"INSERT INTO payments
               (id, idempotency_key, payer_identity, order_id, amount, source_asset,
                destination_asset, status, external_transaction_id, out_amount, exchange_rate,
                price_impact_pct, tolerance_bps, failure_reason, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.idempotency_key)
        .bind(&record.payer_identity)
        .bind(&record.order_id)
        .bind(record.amount)
        .bind(&record.source_asset)
        .bind(&record.destination_asset)
        .bind(record.status.as_str())
        .bind(&record.external_transaction_id)
        .bind(record.out_amount)
        .bind(record.exchange_rate)
        .bind(record.price_impact_pct)
        .bind(record.tolerance_bps.map(|bps| bps as i32))
        .bind(&record.failure_reason)
        .bind(record.created_at)
        .bind(record.updated_at)
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
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        // Lock the row so the transition check and the write see the same status.
        let sql = format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        );
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let mut record = row.ok_or(RepoError::NotFound)?.into_domain()?;
        record.apply(update)?;

        sqlx::query(
            r#"UPDATE payments
               SET status = $1, external_transaction_id = $2, out_amount = $3, exchange_rate = $4,
                   price_impact_pct = $5, tolerance_bps = $6, failure_reason = $7, updated_at = $8
               WHERE id = $9"#,
        )
        .bind(record.status.as_str())
        .bind(&record.external_transaction_id)
        .bind(record.out_amount)
        .bind(record.exchange_rate)
        .bind(record.price_impact_pct)
        .bind(record.tolerance_bps.map(|bps| bps as i32))
        .bind(&record.failure_reason)
        .bind(record.updated_at)
        .bind(id.as_uuid())
        .execute(&mut *db_tx)
        .await
        .map_err(map_sqlx_error)?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(record)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>, RepoError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let row: Option<DbPayment> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPayment::into_domain).transpose()
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
