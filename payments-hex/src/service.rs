//! Payment Application Service
//!
//! Orchestrates one `POST /payments` call: authenticate, deduplicate,
//! record, settle, persist, cache. The record store's uniqueness constraint
//! decides which request settles; the cache only short-circuits replays.

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, error, info, warn};

use payments_types::{
    AppError, CreatePaymentRequest, DomainError, IdempotencyCache, PAYMENT_FAILED,
    PaymentOutcome, PaymentRecord, PaymentRecordStore, PaymentRequest, PaymentUpdate, RepoError,
};

use crate::auth::verify_wallet_signature;
use crate::executor::SettlementExecutor;

/// Writes of a terminal update before falling back to the in-memory outcome.
const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_BACKOFF: Duration = Duration::from_millis(200);

/// Orchestrator knobs.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Lifetime of a cached outcome.
    pub cache_ttl: Duration,
    /// How long a duplicate request waits for the winning request's outcome.
    pub in_flight_wait: Duration,
    pub in_flight_poll: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            in_flight_wait: Duration::from_secs(90),
            in_flight_poll: Duration::from_millis(250),
        }
    }
}

/// What the cache and record store already know about a request.
enum Lookup {
    Settled(PaymentOutcome),
    InFlight,
    Absent,
}

/// Application service for payment settlement.
///
/// Generic over the record store and the idempotency cache; both are shared
/// with the spawned settlement tasks.
pub struct PaymentService<R: PaymentRecordStore, C: IdempotencyCache> {
    repo: Arc<R>,
    cache: Arc<C>,
    executor: Arc<SettlementExecutor>,
    config: ServiceConfig,
}

impl<R: PaymentRecordStore, C: IdempotencyCache> PaymentService<R, C> {
    pub fn new(repo: R, cache: C, executor: SettlementExecutor) -> Self {
        Self::with_config(repo, cache, executor, ServiceConfig::default())
    }

    pub fn with_config(
        repo: R,
        cache: C,
        executor: SettlementExecutor,
        config: ServiceConfig,
    ) -> Self {
        Self {
            repo: Arc::new(repo),
            cache: Arc::new(cache),
            executor: Arc::new(executor),
            config,
        }
    }

    /// Returns a reference to the underlying record store.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Shared handle, e.g. for a background expiry sweep.
    pub fn cache(&self) -> Arc<C> {
        Arc::clone(&self.cache)
    }

    /// Validates, authenticates and settles a payment at most once per
    /// idempotency key, returning the terminal outcome.
    #[tracing::instrument(skip(self, body), fields(order_id = %body.order_id))]
    pub async fn submit_payment(
        &self,
        idempotency_key: &str,
        body: CreatePaymentRequest,
    ) -> Result<PaymentOutcome, AppError> {
        let req = PaymentRequest::new(idempotency_key, body)?;
        self.executor.validate(&req)?;

        if !verify_wallet_signature(&req.payer_identity, &req.signed_message, &req.nonce) {
            warn!("Wallet signature rejected");
            return Err(AppError::Forbidden("Invalid wallet signature".into()));
        }

        match self.lookup(&req).await? {
            Lookup::Settled(outcome) => {
                info!(payment_id = %outcome.payment().id, "Replaying settled payment");
                return Ok(outcome);
            }
            Lookup::InFlight => return self.await_settled(&req).await,
            Lookup::Absent => {}
        }

        let record = match self.repo.create(PaymentRecord::processing(&req)).await {
            Ok(record) => record,
            Err(RepoError::DuplicateKey(detail)) => {
                info!(%detail, "Lost creation race, waiting for the winning request");
                return self.await_settled(&req).await;
            }
            Err(e) => return Err(e.into()),
        };
        info!(payment_id = %record.id, "Payment record created");

        // Detached so a caller disconnect cannot cancel a submitted settlement.
        let task = tokio::spawn(
            settle(
                self.repo.clone(),
                self.cache.clone(),
                self.executor.clone(),
                self.config.cache_ttl,
                record,
                req,
            )
            .in_current_span(),
        );

        task.await
            .map_err(|e| AppError::Internal(format!("Settlement task failed: {}", e)))
    }

    /// Cache first, then the durable record by key and by order.
    async fn lookup(&self, req: &PaymentRequest) -> Result<Lookup, AppError> {
        if let Some(outcome) = self.cached_outcome(req).await? {
            return Ok(Lookup::Settled(outcome));
        }

        let existing = match self
            .repo
            .find_by_idempotency_key(&req.idempotency_key)
            .await?
        {
            Some(record) => {
                ensure_same_order(&record, req)?;
                Some(record)
            }
            None => self.repo.find_by_order_id(&req.order_id).await?,
        };

        let Some(record) = existing else {
            return Ok(Lookup::Absent);
        };
        match PaymentOutcome::from_record(record) {
            Some(outcome) => {
                remember(
                    self.cache.as_ref(),
                    &req.idempotency_key,
                    &outcome,
                    self.config.cache_ttl,
                )
                .await;
                Ok(Lookup::Settled(outcome))
            }
            None => Ok(Lookup::InFlight),
        }
    }

    /// Cache errors and undecodable entries read as misses.
    async fn cached_outcome(&self, req: &PaymentRequest) -> Result<Option<PaymentOutcome>, AppError> {
        let cached = match self.cache.get(&req.idempotency_key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Idempotency cache read failed");
                None
            }
        };
        let Some(raw) = cached else {
            return Ok(None);
        };

        match serde_json::from_str::<PaymentOutcome>(&raw) {
            Ok(outcome) => {
                ensure_same_order(outcome.payment(), req)?;
                Ok(Some(outcome))
            }
            Err(e) => {
                warn!(error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Waits for another request's settlement to reach a terminal state.
    async fn await_settled(&self, req: &PaymentRequest) -> Result<PaymentOutcome, AppError> {
        let deadline = tokio::time::Instant::now() + self.config.in_flight_wait;

        loop {
            tokio::time::sleep(self.config.in_flight_poll).await;
            if let Lookup::Settled(outcome) = self.lookup(req).await? {
                return Ok(outcome);
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("Gave up waiting for in-flight payment");
                return Err(AppError::Conflict(
                    "Payment is still being processed".into(),
                ));
            }
        }
    }
}

fn ensure_same_order(record: &PaymentRecord, req: &PaymentRequest) -> Result<(), AppError> {
    if record.order_id != req.order_id {
        return Err(AppError::Conflict(
            "Idempotency-Key was already used for a different order".into(),
        ));
    }
    Ok(())
}

/// Write-once: a live entry for `key` is left untouched.
async fn remember<C: IdempotencyCache + ?Sized>(
    cache: &C,
    key: &str,
    outcome: &PaymentOutcome,
    ttl: Duration,
) {
    let value = match serde_json::to_string(outcome) {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "Failed to serialize payment outcome");
            return;
        }
    };
    match cache.set(key, value, ttl).await {
        Ok(true) => debug!("Outcome cached"),
        Ok(false) => debug!("Outcome already cached"),
        Err(e) => warn!(error = %e, "Idempotency cache write failed"),
    }
}

/// Runs the executor and persists its result. Only the request that created
/// `record` ever calls this, and it always yields a terminal outcome.
async fn settle<R: PaymentRecordStore, C: IdempotencyCache>(
    repo: Arc<R>,
    cache: Arc<C>,
    executor: Arc<SettlementExecutor>,
    cache_ttl: Duration,
    record: PaymentRecord,
    req: PaymentRequest,
) -> PaymentOutcome {
    let update = run_attempt(executor, req.clone()).await;
    let outcome = persist(repo.as_ref(), record, update).await;
    remember(cache.as_ref(), &req.idempotency_key, &outcome, cache_ttl).await;
    outcome
}

/// Runs the executor on its own task so a panic ends the attempt as failed
/// instead of leaving the record in `processing`.
async fn run_attempt(executor: Arc<SettlementExecutor>, req: PaymentRequest) -> PaymentUpdate {
    let attempt = tokio::spawn(async move { executor.execute(&req).await }.in_current_span());
    match attempt.await {
        Ok(Ok(receipt)) => PaymentUpdate::completed(receipt),
        Ok(Err(e)) => PaymentUpdate::failed(&e),
        Err(e) => {
            error!(error = %e, "Settlement attempt aborted");
            PaymentUpdate::aborted(e.to_string())
        }
    }
}

/// Writes the terminal update, retrying transient store failures. When the
/// store stays unavailable the outcome is still returned (and cached by the
/// caller) so replays converge on it.
async fn persist<R: PaymentRecordStore>(
    repo: &R,
    record: PaymentRecord,
    update: PaymentUpdate,
) -> PaymentOutcome {
    for attempt in 1..=PERSIST_ATTEMPTS {
        match repo.update(record.id, update.clone()).await {
            Ok(saved) => {
                info!(payment_id = %saved.id, status = %saved.status, "Payment settled");
                if let Some(outcome) = PaymentOutcome::from_record(saved) {
                    return outcome;
                }
            }
            // An earlier write may have landed without being acknowledged.
            Err(RepoError::Domain(DomainError::InvalidTransition { .. })) => {
                if let Ok(Some(outcome)) = repo
                    .get(record.id)
                    .await
                    .map(|found| found.and_then(PaymentOutcome::from_record))
                {
                    return outcome;
                }
            }
            Err(e) => {
                warn!(
                    payment_id = %record.id,
                    attempt,
                    error = %e,
                    "Failed to persist settlement result"
                );
            }
        }
        if attempt < PERSIST_ATTEMPTS {
            tokio::time::sleep(PERSIST_BACKOFF * attempt).await;
        }
    }

    error!(payment_id = %record.id, "Settlement result not persisted; serving it from memory");
    unpersisted_outcome(record, update)
}

fn unpersisted_outcome(mut record: PaymentRecord, update: PaymentUpdate) -> PaymentOutcome {
    let details = update
        .failure_reason
        .clone()
        .unwrap_or_else(|| "settlement result could not be recorded".to_string());
    if record.apply(update).is_ok() {
        if let Some(outcome) = PaymentOutcome::from_record(record.clone()) {
            return outcome;
        }
    }
    PaymentOutcome::Failed {
        payment: record,
        error: PAYMENT_FAILED.to_string(),
        details,
    }
}
