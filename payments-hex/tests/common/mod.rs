//! Shared fixtures for the HTTP-level tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use payments_hex::{
    ExecutorConfig, PaymentService, SettlementExecutor, ToleranceCalculator, ToleranceConfig,
    inbound::HttpServer,
};
use payments_repo::{MemoryCache, SqliteRepo};
use payments_types::{
    BuildRequest, Commitment, ConfirmationStatus, InstructionSigner, NetworkError, ProviderError,
    Quote, QuoteRequest, SettlementInstruction, SettlementNetwork, SignedInstruction, SignerError,
    SwapProvider, challenge_message,
};

pub struct StubProvider {
    pub fail_quotes: bool,
}

#[async_trait]
impl SwapProvider for StubProvider {
    async fn quote(&self, req: &QuoteRequest) -> Result<Quote, ProviderError> {
        if self.fail_quotes {
            return Err(ProviderError::Unavailable("quote failed after 3 attempt(s)".into()));
        }
        Ok(Quote {
            input_asset: req.input_asset.clone(),
            output_asset: req.output_asset.clone(),
            in_amount: req.amount,
            out_amount: "0.65".parse().unwrap(),
            price: "0.0065".parse().unwrap(),
            price_impact_pct: Some("0.1".parse().unwrap()),
            tolerance: req.tolerance,
            raw: serde_json::json!({}),
        })
    }

    async fn build(&self, _req: &BuildRequest) -> Result<SettlementInstruction, ProviderError> {
        Ok(SettlementInstruction {
            payload: vec![4, 5, 6],
        })
    }
}

#[derive(Default)]
pub struct StubNetwork {
    pub submits: AtomicU32,
}

impl StubNetwork {
    pub fn submit_count(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementNetwork for StubNetwork {
    async fn submit(
        &self,
        _instruction: &SignedInstruction,
        _commitment: Commitment,
    ) -> Result<String, NetworkError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("5sig{}", n))
    }

    async fn status(&self, _transaction_id: &str) -> Result<ConfirmationStatus, NetworkError> {
        Ok(ConfirmationStatus::Reached(Commitment::Finalized))
    }
}

pub struct StubSigner;

impl InstructionSigner for StubSigner {
    fn identity(&self) -> String {
        "custodian".into()
    }

    fn sign(&self, instruction: &SettlementInstruction) -> Result<SignedInstruction, SignerError> {
        Ok(SignedInstruction {
            payload: instruction.payload.clone(),
            signature: vec![1; 64],
            signer: self.identity(),
        })
    }
}

pub struct TestApp {
    pub server: HttpServer<SqliteRepo, MemoryCache>,
    pub network: Arc<StubNetwork>,
}

pub async fn test_app(requests_per_minute: u32, fail_quotes: bool) -> TestApp {
    let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
    let provider = Arc::new(StubProvider { fail_quotes });
    let network = Arc::new(StubNetwork::default());
    let executor = SettlementExecutor::new(
        provider.clone(),
        network.clone(),
        Arc::new(StubSigner),
        ToleranceCalculator::new(provider, ToleranceConfig::default()),
        ExecutorConfig::default(),
    );
    let service = PaymentService::new(repo, MemoryCache::new(), executor);
    TestApp {
        server: HttpServer::with_rate_limit(service, requests_per_minute),
        network,
    }
}

pub struct Payer {
    key: SigningKey,
}

impl Payer {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn identity(&self) -> String {
        bs58::encode(self.key.verifying_key().as_bytes()).into_string()
    }

    /// A signed `POST /payments` body.
    pub fn body(&self, order_id: &str, nonce: &str) -> serde_json::Value {
        let signature = self.key.sign(challenge_message(nonce).as_bytes());
        serde_json::json!({
            "payerIdentity": self.identity(),
            "signedMessage": bs58::encode(signature.to_bytes()).into_string(),
            "nonce": nonce,
            "orderId": order_id,
            "amount": "100",
            "sourceAsset": "USDC",
            "destinationAsset": "SOL",
        })
    }
}

pub fn payment_request(idempotency_key: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/payments")
        .header("Content-Type", "application/json");
    if let Some(key) = idempotency_key {
        builder = builder.header("Idempotency-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
