//! JSON-RPC settlement network adapter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use payments_types::{
    Commitment, ConfirmationStatus, NetworkError, SettlementNetwork, SignedInstruction,
};

use crate::retry::{FetchError, RetryingClient, RetrySafety};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    confirmation_status: Option<String>,
    #[serde(default)]
    err: Option<Value>,
}

/// Settlement network reached over JSON-RPC (`sendTransaction` /
/// `getSignatureStatuses`).
pub struct RpcNetwork {
    client: RetryingClient,
    url: String,
    next_id: AtomicU64,
}

impl RpcNetwork {
    pub fn new(url: impl Into<String>, client: RetryingClient) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        safety: RetrySafety,
    ) -> Result<Value, NetworkError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .client
            .fetch_json(method, safety, |http| {
                http.post(&self.url).timeout(REQUEST_TIMEOUT).json(&payload)
            })
            .await
            .map_err(map_fetch_error)?;

        if let Some(err) = response.error {
            return Err(NetworkError::Rejected(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }
        response
            .result
            .ok_or_else(|| NetworkError::Malformed(format!("{} returned no result", method)))
    }
}

/// Single-signer wire layout: signature count, signature, message.
pub fn encode_transaction(instruction: &SignedInstruction) -> String {
    let mut wire = Vec::with_capacity(1 + instruction.signature.len() + instruction.payload.len());
    wire.push(1u8);
    wire.extend_from_slice(&instruction.signature);
    wire.extend_from_slice(&instruction.payload);
    STANDARD.encode(wire)
}

fn map_fetch_error(err: FetchError) -> NetworkError {
    match err {
        FetchError::Exhausted { .. } => NetworkError::Unavailable(err.to_string()),
        FetchError::Rejected { .. } => NetworkError::Rejected(err.to_string()),
        FetchError::Decode { .. } => NetworkError::Malformed(err.to_string()),
    }
}

fn parse_status(result: Value) -> Result<ConfirmationStatus, NetworkError> {
    let entry = result
        .get("value")
        .and_then(|v| v.get(0))
        .cloned()
        .ok_or_else(|| NetworkError::Malformed("status response has no value".into()))?;
    if entry.is_null() {
        return Ok(ConfirmationStatus::Pending);
    }

    let status: SignatureStatus =
        serde_json::from_value(entry).map_err(|e| NetworkError::Malformed(e.to_string()))?;
    if let Some(err) = status.err.filter(|e| !e.is_null()) {
        return Ok(ConfirmationStatus::Failed(err.to_string()));
    }
    Ok(status
        .confirmation_status
        .as_deref()
        .and_then(Commitment::parse)
        .map(ConfirmationStatus::Reached)
        .unwrap_or(ConfirmationStatus::Pending))
}

#[async_trait]
impl SettlementNetwork for RpcNetwork {
    async fn submit(
        &self,
        instruction: &SignedInstruction,
        commitment: Commitment,
    ) -> Result<String, NetworkError> {
        let params = json!([
            encode_transaction(instruction),
            {
                "encoding": "base64",
                "skipPreflight": false,
                "preflightCommitment": commitment.as_str(),
            }
        ]);

        let result = self
            .call("sendTransaction", params, RetrySafety::Mutating)
            .await?;
        match result {
            Value::String(id) if !id.is_empty() => Ok(id),
            other => Err(NetworkError::Malformed(format!(
                "sendTransaction returned {}",
                other
            ))),
        }
    }

    /// The first signature is the transaction id.
    fn transaction_id(&self, instruction: &SignedInstruction) -> Option<String> {
        if instruction.signature.is_empty() {
            return None;
        }
        Some(bs58::encode(&instruction.signature).into_string())
    }

    async fn status(&self, transaction_id: &str) -> Result<ConfirmationStatus, NetworkError> {
        let params = json!([[transaction_id], {"searchTransactionHistory": true}]);
        let result = self
            .call("getSignatureStatuses", params, RetrySafety::Idempotent)
            .await?;
        parse_status(result)
    }
}
