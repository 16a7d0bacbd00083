//! In-memory fakes of the outbound ports, shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use payments_types::{
    BuildRequest, Commitment, ConfirmationStatus, CreatePaymentRequest, FiatProcessor,
    InstructionSigner, IntentStatus, NetworkError, PaymentIntent, PaymentIntentRequest,
    PaymentRequest, ProviderError, Quote, QuoteRequest, SettlementInstruction, SettlementNetwork,
    SignedInstruction, SignerError, SwapProvider,
};

pub fn payment_request(key: &str, order_id: &str) -> PaymentRequest {
    PaymentRequest::new(
        key,
        CreatePaymentRequest {
            payer_identity: "payer-identity".into(),
            signed_message: "signature".into(),
            nonce: "nonce".into(),
            order_id: order_id.into(),
            amount: Decimal::from(100),
            source_asset: "USDC".into(),
            destination_asset: "SOL".into(),
            payment_method: None,
        },
    )
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Swap provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum ProviderMode {
    Healthy,
    Down,
    RejectingBuild,
    Panicking,
}

pub struct FakeProvider {
    mode: ProviderMode,
    quotes: AtomicU32,
    tokens: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn with_mode(mode: ProviderMode) -> Self {
        Self {
            mode,
            quotes: AtomicU32::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::with_mode(ProviderMode::Healthy)
    }

    pub fn down() -> Self {
        Self::with_mode(ProviderMode::Down)
    }

    pub fn rejecting_build() -> Self {
        Self::with_mode(ProviderMode::RejectingBuild)
    }

    /// Crashes inside `quote`, like a provider adapter hitting a bug.
    pub fn panicking() -> Self {
        Self::with_mode(ProviderMode::Panicking)
    }

    pub fn quote_count(&self) -> u32 {
        self.quotes.load(Ordering::SeqCst)
    }

    /// Anti-replay tokens seen by `build`, in call order.
    pub fn build_tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapProvider for FakeProvider {
    async fn quote(&self, req: &QuoteRequest) -> Result<Quote, ProviderError> {
        self.quotes.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ProviderMode::Down => {
                return Err(ProviderError::Unavailable("quote failed after 3 attempt(s)".into()));
            }
            ProviderMode::Panicking => panic!("quote adapter crashed"),
            _ => {}
        }
        Ok(Quote {
            input_asset: req.input_asset.clone(),
            output_asset: req.output_asset.clone(),
            in_amount: req.amount,
            out_amount: "0.65".parse().unwrap(),
            price: "0.0065".parse().unwrap(),
            price_impact_pct: Some("0.2".parse().unwrap()),
            tolerance: req.tolerance,
            raw: serde_json::json!({"outAmount": "0.65"}),
        })
    }

    async fn build(&self, req: &BuildRequest) -> Result<SettlementInstruction, ProviderError> {
        self.tokens
            .lock()
            .unwrap()
            .push(req.anti_replay_token.clone());
        match self.mode {
            ProviderMode::RejectingBuild => Err(ProviderError::Rejected("quote expired".into())),
            _ => Ok(SettlementInstruction {
                payload: vec![1, 2, 3],
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settlement network
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum NetworkMode {
    /// Reports `Pending` for the first `n` polls, then `confirmed`.
    ConfirmingAfter(u32),
    Rejecting,
    Never,
}

pub struct FakeNetwork {
    mode: NetworkMode,
    submits: AtomicU32,
    polls: AtomicU32,
}

impl FakeNetwork {
    fn with_mode(mode: NetworkMode) -> Self {
        Self {
            mode,
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }

    pub fn confirming_after(polls: u32) -> Self {
        Self::with_mode(NetworkMode::ConfirmingAfter(polls))
    }

    pub fn rejecting() -> Self {
        Self::with_mode(NetworkMode::Rejecting)
    }

    pub fn never_confirming() -> Self {
        Self::with_mode(NetworkMode::Never)
    }

    pub fn submit_count(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementNetwork for FakeNetwork {
    async fn submit(
        &self,
        _instruction: &SignedInstruction,
        _commitment: Commitment,
    ) -> Result<String, NetworkError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        match self.mode {
            NetworkMode::Rejecting => Err(NetworkError::Rejected("blockhash not found".into())),
            _ => Ok(format!("tx-{}", n)),
        }
    }

    fn transaction_id(&self, instruction: &SignedInstruction) -> Option<String> {
        let head: String = instruction
            .signature
            .iter()
            .take(2)
            .map(|b| format!("{:02x}", b))
            .collect();
        Some(format!("sig-{}", head))
    }

    async fn status(&self, _transaction_id: &str) -> Result<ConfirmationStatus, NetworkError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            NetworkMode::ConfirmingAfter(pending) if n >= pending => {
                Ok(ConfirmationStatus::Reached(Commitment::Confirmed))
            }
            _ => Ok(ConfirmationStatus::Pending),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signer
// ─────────────────────────────────────────────────────────────────────────────

pub struct FakeSigner;

impl InstructionSigner for FakeSigner {
    fn identity(&self) -> String {
        "custodian".into()
    }

    fn sign(&self, instruction: &SettlementInstruction) -> Result<SignedInstruction, SignerError> {
        Ok(SignedInstruction {
            payload: instruction.payload.clone(),
            signature: vec![7; 64],
            signer: self.identity(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Card processor
// ─────────────────────────────────────────────────────────────────────────────

/// Answers `create_intent` with the first scripted status and each
/// `retrieve_intent` with the next; the last status repeats.
pub struct FakeFiat {
    statuses: Mutex<VecDeque<IntentStatus>>,
    declining: bool,
    requests: Mutex<Vec<PaymentIntentRequest>>,
}

impl FakeFiat {
    pub fn scripted(statuses: impl IntoIterator<Item = IntentStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            declining: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::scripted([IntentStatus::Succeeded])
    }

    pub fn declining() -> Self {
        Self {
            declining: true,
            ..Self::succeeding()
        }
    }

    pub fn requests(&self) -> Vec<PaymentIntentRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_status(&self) -> IntentStatus {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or(IntentStatus::Processing)
        }
    }
}

#[async_trait]
impl FiatProcessor for FakeFiat {
    async fn create_intent(
        &self,
        req: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        if self.declining {
            return Err(ProviderError::Rejected("HTTP 402: Your card was declined.".into()));
        }
        Ok(PaymentIntent {
            id: "pi_1".into(),
            status: self.next_status(),
        })
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, ProviderError> {
        Ok(PaymentIntent {
            id: id.to_string(),
            status: self.next_status(),
        })
    }
}
