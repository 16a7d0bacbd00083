//! Payment record store port.
//!
//! This is the correctness authority for "exactly one settlement attempt
//! per idempotency key". Adapters (Postgres, SQLite) implement this trait.

use crate::domain::{PaymentId, PaymentRecord, PaymentUpdate};
use crate::error::RepoError;

/// Durable store for payment records.
///
/// Implementations MUST enforce uniqueness of both `idempotency_key` and
/// `order_id`, failing `create` with [`RepoError::DuplicateKey`] on collision.
#[async_trait::async_trait]
pub trait PaymentRecordStore: Send + Sync + 'static {
    /// Inserts a new record.
    async fn create(&self, record: PaymentRecord) -> Result<PaymentRecord, RepoError>;

    /// Applies a status update. Fails with a domain `InvalidTransition`
    /// when the stored status does not allow it.
    async fn update(&self, id: PaymentId, update: PaymentUpdate)
    -> Result<PaymentRecord, RepoError>;

    /// Gets a record by ID.
    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>, RepoError>;

    /// Finds the record created for an idempotency key.
    async fn find_by_idempotency_key(&self, key: &str)
    -> Result<Option<PaymentRecord>, RepoError>;

    /// Finds the record created for an order.
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<PaymentRecord>, RepoError>;
}
