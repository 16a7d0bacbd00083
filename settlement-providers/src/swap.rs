//! HTTP swap provider adapter (quote + build endpoints).

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use payments_types::{
    BuildRequest, ProviderError, Quote, QuoteRequest, SettlementInstruction, SwapProvider,
};

use crate::retry::{FetchError, RetryingClient, RetrySafety};

/// Per-request ceiling for provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `data` payload of a successful quote response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteData {
    #[serde(default)]
    price_impact_pct: Option<Decimal>,
    out_amount: Decimal,
    price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildData {
    settlement_instruction: String,
}

/// Swap provider reached over HTTP.
///
/// - `GET  {base}/quote?inputAsset&outputAsset&amount&toleranceBps` → `{data: {...}}`
/// - `POST {base}/build` → `{settlementInstruction}`
///
/// Either endpoint may answer with an `{error}` envelope instead.
pub struct HttpSwapProvider {
    client: RetryingClient,
    base_url: String,
}

impl HttpSwapProvider {
    pub fn new(base_url: impl Into<String>, client: RetryingClient) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl SwapProvider for HttpSwapProvider {
    #[tracing::instrument(skip(self), fields(pair = %format!("{}->{}", req.input_asset, req.output_asset)))]
    async fn quote(&self, req: &QuoteRequest) -> Result<Quote, ProviderError> {
        let url = format!("{}/quote", self.base_url);
        let amount = req.amount.to_string();
        let tolerance = req.tolerance.bps().to_string();

        let body: Value = self
            .client
            .fetch_json("quote", RetrySafety::Idempotent, |http| {
                http.get(&url).timeout(REQUEST_TIMEOUT).query(&[
                    ("inputAsset", req.input_asset.as_str()),
                    ("outputAsset", req.output_asset.as_str()),
                    ("amount", amount.as_str()),
                    ("toleranceBps", tolerance.as_str()),
                ])
            })
            .await
            .map_err(map_fetch_error)?;

        parse_quote(body, req)
    }

    #[tracing::instrument(skip(self, req), fields(token = %req.anti_replay_token))]
    async fn build(&self, req: &BuildRequest) -> Result<SettlementInstruction, ProviderError> {
        let url = format!("{}/build", self.base_url);
        let payload = json!({
            "quoteResponse": req.quote.raw,
            "recipientIdentity": req.recipient_identity,
            "antiReplayToken": req.anti_replay_token,
            "feeParameters": req.fee_parameters,
        });

        // The anti-replay token binds every attempt to the same build intent,
        // and building has no effect on the ledger, so it may be retried.
        let body: Value = self
            .client
            .fetch_json("build", RetrySafety::Idempotent, |http| {
                http.post(&url).timeout(REQUEST_TIMEOUT).json(&payload)
            })
            .await
            .map_err(map_fetch_error)?;

        parse_instruction(body)
    }
}

fn map_fetch_error(err: FetchError) -> ProviderError {
    match err {
        FetchError::Exhausted { .. } => ProviderError::Unavailable(err.to_string()),
        FetchError::Rejected { .. } => ProviderError::Rejected(err.to_string()),
        FetchError::Decode { .. } => ProviderError::Malformed(err.to_string()),
    }
}

fn error_envelope(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn parse_quote(body: Value, req: &QuoteRequest) -> Result<Quote, ProviderError> {
    if let Some(message) = error_envelope(&body) {
        return Err(ProviderError::Rejected(message));
    }
    let raw = body
        .get("data")
        .cloned()
        .ok_or_else(|| ProviderError::Malformed("quote response has no data".into()))?;
    let data: QuoteData = serde_json::from_value(raw.clone())
        .map_err(|e| ProviderError::Malformed(e.to_string()))?;

    Ok(Quote {
        input_asset: req.input_asset.clone(),
        output_asset: req.output_asset.clone(),
        in_amount: req.amount,
        out_amount: data.out_amount,
        price: data.price,
        price_impact_pct: data.price_impact_pct,
        tolerance: req.tolerance,
        raw,
    })
}

fn parse_instruction(body: Value) -> Result<SettlementInstruction, ProviderError> {
    if let Some(message) = error_envelope(&body) {
        return Err(ProviderError::Rejected(message));
    }
    let data: BuildData =
        serde_json::from_value(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let payload = STANDARD
        .decode(data.settlement_instruction.as_bytes())
        .map_err(|e| ProviderError::Malformed(format!("settlementInstruction: {}", e)))?;
    if payload.is_empty() {
        return Err(ProviderError::Malformed("empty settlementInstruction".into()));
    }

    Ok(SettlementInstruction { payload })
}
