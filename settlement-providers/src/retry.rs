//! Retrying HTTP client.
//!
//! Every call declares whether it is safe to repeat. Idempotent calls (reads,
//! and writes the provider deduplicates by an idempotency token) get the full
//! attempt budget; other mutating calls get exactly one attempt.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Longest error body kept in a [`FetchError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// Whether an outbound operation may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySafety {
    /// No side effects on the provider; repeat freely.
    Idempotent,
    /// Changes provider state; at most one attempt.
    Mutating,
}

/// Retry policy with exponential backoff and a delay floor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Minimum wait between two attempts.
    pub min_delay: Duration,
    pub backoff_multiplier: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            backoff_multiplier: 2,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Number of attempts allowed for an operation of the given safety.
    pub fn attempts_for(&self, safety: RetrySafety) -> u32 {
        match safety {
            RetrySafety::Idempotent => self.max_attempts.max(1),
            RetrySafety::Mutating => 1,
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    pub fn delay_for_attempt(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        let factor = self.backoff_multiplier.max(1).saturating_pow(exponent);
        let delay = self.min_delay.saturating_mul(factor);
        delay.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

/// Terminal failure of an outbound call.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: String,
    },

    #[error("{operation} rejected with HTTP {status}: {body}")]
    Rejected {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} returned an undecodable body: {reason}")]
    Decode { operation: String, reason: String },
}

/// Outcome of a single attempt, as seen by [`retry`].
#[derive(Debug)]
pub enum AttemptError {
    /// Worth another attempt if the budget allows.
    Transient(String),
    /// Stop immediately.
    Fatal(FetchError),
}

/// Runs `attempt` until it succeeds, fails fatally, or the budget is spent.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    safety: RetrySafety,
    operation: &str,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.attempts_for(safety);
    let mut current = 1;

    loop {
        match attempt(current).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Transient(cause)) => {
                if current >= max_attempts {
                    return Err(FetchError::Exhausted {
                        operation: operation.to_string(),
                        attempts: current,
                        last: cause,
                    });
                }

                let delay = policy.delay_for_attempt(current);
                warn!(
                    operation,
                    attempt = current,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    %cause,
                    "External call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                current += 1;
            }
        }
    }
}

/// Transport failures and these statuses are worth retrying.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Cuts `text` to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

/// HTTP client that applies a [`RetryPolicy`] to each call.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_client(Client::new(), policy)
    }

    pub fn with_client(http: Client, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends the request built by `build` with retry, returning the first
    /// successful response.
    ///
    /// `build` is invoked once per attempt so each attempt sends a fresh request.
    pub async fn fetch_with_retry<B>(
        &self,
        operation: &str,
        safety: RetrySafety,
        build: B,
    ) -> Result<Response, FetchError>
    where
        B: Fn(&Client) -> RequestBuilder,
    {
        retry(&self.policy, safety, operation, |attempt| {
            let request = build(&self.http);
            async move {
                debug!(operation, attempt, "Sending external request");
                let response = match request.send().await {
                    Ok(response) => response,
                    Err(e) => return Err(AttemptError::Transient(e.to_string())),
                };

                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                if is_retryable_status(status) {
                    return Err(AttemptError::Transient(format!("HTTP {}", status)));
                }

                let mut body = response.text().await.unwrap_or_default();
                truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
                Err(AttemptError::Fatal(FetchError::Rejected {
                    operation: operation.to_string(),
                    status: status.as_u16(),
                    body,
                }))
            }
        })
        .await
    }

    /// Like [`fetch_with_retry`](Self::fetch_with_retry), decoding a JSON body.
    /// A body that does not decode is a fatal error, never retried.
    pub async fn fetch_json<T, B>(
        &self,
        operation: &str,
        safety: RetrySafety,
        build: B,
    ) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
    {
        let response = self.fetch_with_retry(operation, safety, build).await?;
        response.json::<T>().await.map_err(|e| FetchError::Decode {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }
}
