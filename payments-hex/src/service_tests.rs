//! PaymentService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use payments_repo::MemoryCache;
    use payments_types::{
        AppError, CacheError, CreatePaymentRequest, IdempotencyCache, PaymentId, PaymentOutcome,
        PaymentRecord, PaymentRecordStore, PaymentStatus, PaymentUpdate, RepoError,
    };

    use crate::auth::test_support::Payer;
    use crate::fakes::{FakeFiat, FakeNetwork, FakeProvider, FakeSigner, payment_request};
    use crate::{
        ExecutorConfig, PaymentService, ServiceConfig, SettlementExecutor, ToleranceCalculator,
        ToleranceConfig,
    };

    /// In-memory record store enforcing key and order uniqueness.
    pub struct MockRepo {
        records: Mutex<HashMap<PaymentId, PaymentRecord>>,
        creates: AtomicU32,
        /// Number of upcoming `update` calls that fail with a database error.
        failing_updates: AtomicU32,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                creates: AtomicU32::new(0),
                failing_updates: AtomicU32::new(0),
            }
        }

        pub fn fail_next_updates(&self, n: u32) {
            self.failing_updates.store(n, Ordering::SeqCst);
        }

        /// Successful inserts so far.
        pub fn create_count(&self) -> u32 {
            self.creates.load(Ordering::SeqCst)
        }

        fn find(&self, pred: impl Fn(&PaymentRecord) -> bool) -> Option<PaymentRecord> {
            self.records
                .lock()
                .unwrap()
                .values()
                .find(|r| pred(r))
                .cloned()
        }
    }

    #[async_trait]
    impl PaymentRecordStore for MockRepo {
        async fn create(&self, record: PaymentRecord) -> Result<PaymentRecord, RepoError> {
            let mut records = self.records.lock().unwrap();
            if records.values().any(|r| {
                r.idempotency_key == record.idempotency_key || r.order_id == record.order_id
            }) {
                return Err(RepoError::DuplicateKey(record.idempotency_key));
            }
            records.insert(record.id, record.clone());
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(record)
        }

        async fn update(
            &self,
            id: PaymentId,
            update: PaymentUpdate,
        ) -> Result<PaymentRecord, RepoError> {
            let failing = self
                .failing_updates
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if failing.is_ok() {
                return Err(RepoError::Database("connection reset".into()));
            }
            let mut records = self.records.lock().unwrap();
            let record = records.get_mut(&id).ok_or(RepoError::NotFound)?;
            record.apply(update)?;
            Ok(record.clone())
        }

        async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>, RepoError> {
            Ok(self.records.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_idempotency_key(
            &self,
            key: &str,
        ) -> Result<Option<PaymentRecord>, RepoError> {
            Ok(self.find(|r| r.idempotency_key == key))
        }

        async fn find_by_order_id(
            &self,
            order_id: &str,
        ) -> Result<Option<PaymentRecord>, RepoError> {
            Ok(self.find(|r| r.order_id == order_id))
        }
    }

    /// Cache that is always down.
    struct UnavailableCache;

    #[async_trait]
    impl IdempotencyCache for UnavailableCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<bool, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    struct Harness<C: IdempotencyCache> {
        service: PaymentService<MockRepo, C>,
        provider: Arc<FakeProvider>,
        network: Arc<FakeNetwork>,
        payer: Payer,
    }

    impl<C: IdempotencyCache> Harness<C> {
        fn body(&self, order_id: &str) -> CreatePaymentRequest {
            let nonce = format!("nonce-{}", order_id);
            CreatePaymentRequest {
                payer_identity: self.payer.identity(),
                signed_message: self.payer.sign_challenge(&nonce),
                nonce,
                order_id: order_id.into(),
                amount: Decimal::from(100),
                source_asset: "USDC".into(),
                destination_asset: "SOL".into(),
                payment_method: None,
            }
        }
    }

    fn harness_with<C: IdempotencyCache>(
        cache: C,
        provider: FakeProvider,
        network: FakeNetwork,
        config: ServiceConfig,
    ) -> Harness<C> {
        let provider = Arc::new(provider);
        let network = Arc::new(network);
        let executor = SettlementExecutor::new(
            provider.clone(),
            network.clone(),
            Arc::new(FakeSigner),
            ToleranceCalculator::new(provider.clone(), ToleranceConfig::default()),
            ExecutorConfig::default(),
        );
        Harness {
            service: PaymentService::with_config(MockRepo::new(), cache, executor, config),
            provider,
            network,
            payer: Payer::generate(),
        }
    }

    fn harness(provider: FakeProvider, network: FakeNetwork) -> Harness<MemoryCache> {
        harness_with(MemoryCache::new(), provider, network, ServiceConfig::default())
    }

    fn json(outcome: &PaymentOutcome) -> String {
        serde_json::to_string(outcome).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_payment_completes_and_is_cached() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(1));

        let outcome = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        let payment = outcome.payment();
        assert!(outcome.is_completed());
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.external_transaction_id.as_deref(), Some("tx-1"));
        assert_eq!(payment.tolerance_bps, Some(80));

        let cached = h.service.cache().get("key-1").await.unwrap().unwrap();
        assert_eq!(cached, json(&outcome));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_returns_identical_outcome_without_settling_again() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));

        let first = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        let second = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        assert_eq!(json(&first), json(&second));
        assert_eq!(h.network.submit_count(), 1);
        assert_eq!(h.service.repo().create_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_signature_is_forbidden_and_creates_nothing() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));
        let mut body = h.body("order-1");
        body.nonce = "some-other-nonce".into();

        let result = h.service.submit_payment("key-1", body).await;

        assert!(matches!(result, Err(AppError::Forbidden(m)) if m == "Invalid wallet signature"));
        assert_eq!(h.service.repo().create_count(), 0);
        assert_eq!(h.provider.quote_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_body_is_rejected_before_signature_check() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));
        let mut body = h.body("order-1");
        body.amount = Decimal::ZERO;
        body.signed_message = "tampered".into();

        let result = h.service.submit_payment("key-1", body).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_outage_fails_payment_and_caches_failure() {
        let h = harness(FakeProvider::down(), FakeNetwork::confirming_after(0));

        let first = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        let quotes_after_first = h.provider.quote_count();
        let second = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        match &first {
            PaymentOutcome::Failed { payment, error, details } => {
                assert_eq!(payment.status, PaymentStatus::Failed);
                assert_eq!(error, "Payment failed");
                assert!(details.starts_with("Quote unavailable"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(json(&first), json(&second));
        assert_eq!(h.provider.quote_count(), quotes_after_first);
        assert_eq!(h.network.submit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_records_transaction_id() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::never_confirming());

        let outcome = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        let payment = outcome.payment();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.external_transaction_id.as_deref(), Some("tx-1"));
        assert!(payment.failure_reason.as_deref().unwrap().contains("Confirmation timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_with_same_key_converge() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(3));

        let (a, b) = tokio::join!(
            h.service.submit_payment("key-1", h.body("order-1")),
            h.service.submit_payment("key-1", h.body("order-1")),
        );

        assert_eq!(json(&a.unwrap()), json(&b.unwrap()));
        assert_eq!(h.service.repo().create_count(), 1);
        assert_eq!(h.network.submit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_after_cache_expiry_uses_durable_record() {
        let config = ServiceConfig {
            cache_ttl: Duration::from_secs(5),
            ..ServiceConfig::default()
        };
        let h = harness_with(
            MemoryCache::new(),
            FakeProvider::healthy(),
            FakeNetwork::confirming_after(0),
            config,
        );

        let first = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(h.service.cache().get("key-1").await.unwrap().is_none());

        let second = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        assert_eq!(json(&first), json(&second));
        assert_eq!(h.network.submit_count(), 1);
        // Re-cached from the durable record.
        assert!(h.service.cache().get("key-1").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_order_is_not_settled_again_under_new_key() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));

        let first = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        let second = h.service.submit_payment("key-2", h.body("order-1")).await.unwrap();

        assert_eq!(first.payment().id, second.payment().id);
        assert_eq!(h.network.submit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_reused_for_other_order_is_conflict() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));

        h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        let result = h.service.submit_payment("key-1", h.body("order-2")).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(h.service.repo().create_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_cache_falls_back_to_record_store() {
        let h = harness_with(
            UnavailableCache,
            FakeProvider::healthy(),
            FakeNetwork::confirming_after(0),
            ServiceConfig::default(),
        );

        let first = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        let second = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        assert_eq!(json(&first), json(&second));
        assert_eq!(h.network.submit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_in_flight_payment_is_conflict_after_wait() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));
        let stuck = PaymentRecord::processing(&payment_request("key-1", "order-1"));
        h.service.repo().create(stuck).await.unwrap();

        let result = h.service.submit_payment("key-1", h.body("order-1")).await;

        assert!(matches!(result, Err(AppError::Conflict(m)) if m.contains("still being processed")));
        assert_eq!(h.network.submit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_attempt_is_recorded_as_failed_and_replayed() {
        let h = harness(FakeProvider::panicking(), FakeNetwork::confirming_after(0));

        let first = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        match &first {
            PaymentOutcome::Failed { details, .. } => {
                assert!(details.starts_with("Settlement aborted"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        let stored = h
            .service
            .repo()
            .find_by_idempotency_key("key-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);

        let replay = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        assert_eq!(json(&first), json(&replay));
        assert_eq!(h.network.submit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_store_failure_on_terminal_write_is_retried() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));
        h.service.repo().fail_next_updates(2);

        let outcome = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        assert!(outcome.is_completed());
        let stored = h
            .service
            .repo()
            .find_by_idempotency_key("key-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpersisted_outcome_is_still_cached_for_replays() {
        let h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));
        h.service.repo().fail_next_updates(u32::MAX);

        let first = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();
        let replay = h.service.submit_payment("key-1", h.body("order-1")).await.unwrap();

        assert!(first.is_completed());
        assert_eq!(first.payment().external_transaction_id.as_deref(), Some("tx-1"));
        assert_eq!(json(&first), json(&replay));
        assert_eq!(h.network.submit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fiat_payment_settles_through_processor_and_replays() {
        let mut h = harness(FakeProvider::healthy(), FakeNetwork::confirming_after(0));
        let fiat = Arc::new(FakeFiat::succeeding());
        let executor = SettlementExecutor::new(
            h.provider.clone(),
            h.network.clone(),
            Arc::new(FakeSigner),
            ToleranceCalculator::new(h.provider.clone(), ToleranceConfig::default()),
            ExecutorConfig::default(),
        )
        .with_fiat(fiat.clone(), ["USD"]);
        h.service = PaymentService::new(MockRepo::new(), MemoryCache::new(), executor);

        let mut missing_method = h.body("order-1");
        missing_method.source_asset = "USD".into();
        let rejected = h.service.submit_payment("key-1", missing_method).await;
        assert!(matches!(rejected, Err(AppError::BadRequest(m)) if m.contains("paymentMethod")));
        assert_eq!(h.service.repo().create_count(), 0);

        let mut body = h.body("order-1");
        body.source_asset = "USD".into();
        body.payment_method = Some("pm_card_visa".into());
        let first = h.service.submit_payment("key-1", body.clone()).await.unwrap();
        let replay = h.service.submit_payment("key-1", body).await.unwrap();

        assert!(first.is_completed());
        assert_eq!(first.payment().external_transaction_id.as_deref(), Some("pi_1"));
        assert_eq!(json(&first), json(&replay));
        assert_eq!(fiat.requests().len(), 1);
        assert_eq!(h.network.submit_count(), 0);
    }
}
