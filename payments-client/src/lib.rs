//! # Payments Client SDK
//!
//! A typed Rust client for the settlement API. Requests are signed with the
//! payer's Ed25519 key over the server's challenge message.

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use payments_types::{CreatePaymentRequest, ErrorResponse, PaymentRecord, challenge_message};

/// Header carrying the caller's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<String>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// A payer's Ed25519 keypair.
pub struct PayerKey {
    key: SigningKey,
}

impl PayerKey {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Accepts a base58 32-byte seed or 64-byte `seed || public key` keypair.
    pub fn from_base58(secret: &str) -> Result<Self, ClientError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| ClientError::InvalidKey(e.to_string()))?;

        let key = match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| ClientError::InvalidKey(e.to_string()))?
            }
            n => {
                return Err(ClientError::InvalidKey(format!(
                    "expected 32 or 64 bytes, got {}",
                    n
                )));
            }
        };

        Ok(Self { key })
    }

    /// Base58 64-byte keypair, accepted back by [`from_base58`](Self::from_base58).
    pub fn to_base58(&self) -> String {
        bs58::encode(self.key.to_keypair_bytes()).into_string()
    }

    /// Base58 public key; the `payerIdentity` the server verifies against.
    pub fn identity(&self) -> String {
        bs58::encode(self.key.verifying_key().as_bytes()).into_string()
    }

    /// Base58 signature over the challenge message for `nonce`.
    pub fn sign_challenge(&self, nonce: &str) -> String {
        let signature = self.key.sign(challenge_message(nonce).as_bytes());
        bs58::encode(signature.to_bytes()).into_string()
    }
}

/// What to pay, before authentication fields are attached.
#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub order_id: String,
    pub amount: Decimal,
    pub source_asset: String,
    pub destination_asset: String,
    /// Card processor payment method, for fiat source assets.
    pub payment_method: Option<String>,
}

/// Payments API client.
pub struct PaymentsClient {
    base_url: String,
    http: Client,
}

impl PaymentsClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Signs a fresh challenge and submits the payment.
    ///
    /// Resubmitting with the same `idempotency_key` is safe: the server
    /// replays the first outcome instead of settling again.
    pub async fn submit_payment(
        &self,
        idempotency_key: &str,
        payer: &PayerKey,
        draft: PaymentDraft,
    ) -> Result<PaymentRecord, ClientError> {
        let nonce = Uuid::new_v4().simple().to_string();
        let body = CreatePaymentRequest {
            payer_identity: payer.identity(),
            signed_message: payer.sign_challenge(&nonce),
            nonce,
            order_id: draft.order_id,
            amount: draft.amount,
            source_asset: draft.source_asset,
            destination_asset: draft.destination_asset,
            payment_method: draft.payment_method,
        };

        let resp = self
            .http
            .post(format!("{}/payments", self.base_url))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(&body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let (message, details) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => (err.error, err.details),
                Err(_) => (body, None),
            };
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
                details,
            })
        }
    }
}
