//! Card processor adapter speaking the payment-intents API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use payments_types::{
    FiatProcessor, IntentStatus, PaymentIntent, PaymentIntentRequest, ProviderError,
};

use crate::retry::{FetchError, RetryingClient, RetrySafety};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Header the processor deduplicates intent creation on.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
struct IntentBody {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<PaymentErrorBody>,
}

#[derive(Debug, Deserialize)]
struct PaymentErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Payment-intents processor reached over HTTP.
///
/// - `POST {base}/payment_intents` (form encoded, `confirm=true`)
/// - `GET  {base}/payment_intents/{id}`
///
/// Authenticated with a bearer secret key.
pub struct HttpFiatProcessor {
    client: RetryingClient,
    base_url: String,
    secret_key: String,
}

impl HttpFiatProcessor {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        client: RetryingClient,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            client,
        }
    }
}

#[async_trait]
impl FiatProcessor for HttpFiatProcessor {
    #[tracing::instrument(
        skip(self, req),
        fields(order_id = %req.order_id, currency = %req.currency)
    )]
    async fn create_intent(
        &self,
        req: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, ProviderError> {
        let url = format!("{}/payment_intents", self.base_url);
        let idempotency_key = idempotency_header(&req.idempotency_key);
        let form = [
            ("amount", req.amount_minor.to_string()),
            ("currency", req.currency.clone()),
            ("payment_method", req.payment_method.clone()),
            ("confirm", "true".to_string()),
            ("metadata[order_id]", req.order_id.clone()),
        ];

        // Repeats carry the same Idempotency-Key, which the processor answers
        // with the intent created by the first attempt.
        let body: IntentBody = self
            .client
            .fetch_json("payment intent", RetrySafety::Idempotent, |http| {
                http.post(&url)
                    .timeout(REQUEST_TIMEOUT)
                    .bearer_auth(&self.secret_key)
                    .header(IDEMPOTENCY_HEADER, idempotency_key.as_str())
                    .form(&form)
            })
            .await
            .map_err(map_fetch_error)?;

        Ok(parse_intent(body))
    }

    #[tracing::instrument(skip(self))]
    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, ProviderError> {
        let url = format!("{}/payment_intents/{}", self.base_url, id);
        let body: IntentBody = self
            .client
            .fetch_json("intent status", RetrySafety::Idempotent, |http| {
                http.get(&url)
                    .timeout(REQUEST_TIMEOUT)
                    .bearer_auth(&self.secret_key)
            })
            .await
            .map_err(map_fetch_error)?;

        Ok(parse_intent(body))
    }
}

/// Keys that are not plain visible ASCII cannot travel in a header verbatim.
fn idempotency_header(key: &str) -> String {
    if key.bytes().all(|b| b.is_ascii_graphic()) {
        key.to_string()
    } else {
        bs58::encode(key.as_bytes()).into_string()
    }
}

fn parse_intent(body: IntentBody) -> PaymentIntent {
    let status = match body.status.as_str() {
        "succeeded" => IntentStatus::Succeeded,
        "processing" => IntentStatus::Processing,
        "requires_action" => IntentStatus::RequiresAction,
        other => {
            let reason = body
                .last_payment_error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("payment intent is {}", other));
            IntentStatus::Failed(reason)
        }
    };
    PaymentIntent {
        id: body.id,
        status,
    }
}

/// Declines come back as 4xx with an `{error: {message}}` body.
fn map_fetch_error(err: FetchError) -> ProviderError {
    match &err {
        FetchError::Exhausted { .. } => ProviderError::Unavailable(err.to_string()),
        FetchError::Rejected { status, body, .. } => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string));
            match message {
                Some(message) => ProviderError::Rejected(format!("HTTP {}: {}", status, message)),
                None => ProviderError::Rejected(err.to_string()),
            }
        }
        FetchError::Decode { .. } => ProviderError::Malformed(err.to_string()),
    }
}
