//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use payments_types::{
    AppError, CreatePaymentRequest, DomainError, ErrorResponse, IdempotencyCache,
    PAYMENT_FAILED, PaymentOutcome, PaymentRecordStore,
};

use crate::PaymentService;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Application state shared across handlers.
pub struct AppState<R: PaymentRecordStore, C: IdempotencyCache> {
    pub service: PaymentService<R, C>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, error_body(msg)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, error_body(msg)),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed on internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: PAYMENT_FAILED.to_string(),
                        details: Some(msg),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(error: String) -> ErrorResponse {
    ErrorResponse {
        error,
        details: None,
    }
}

/// Renders a terminal outcome. A replay renders the same outcome, so its body
/// is byte-identical to the first response.
pub fn outcome_response(outcome: PaymentOutcome) -> Response {
    match outcome {
        PaymentOutcome::Completed { payment } => (StatusCode::OK, Json(payment)).into_response(),
        PaymentOutcome::Failed { error, details, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error,
                details: Some(details),
            }),
        )
            .into_response(),
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Submit a payment for settlement.
///
/// The body is decoded by hand so a missing `Idempotency-Key` is reported
/// before any body error.
#[tracing::instrument(skip_all, fields(idempotency_key = tracing::field::Empty))]
pub async fn create_payment<R: PaymentRecordStore, C: IdempotencyCache>(
    State(state): State<Arc<AppState<R, C>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest(DomainError::MissingIdempotencyKey.to_string()))?;
    tracing::Span::current().record("idempotency_key", key);

    let req: CreatePaymentRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;

    let outcome = state.service.submit_payment(key, req).await?;
    Ok(outcome_response(outcome))
}
