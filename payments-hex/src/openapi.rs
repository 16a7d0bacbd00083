//! OpenAPI document and Swagger UI wiring.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use payments_types::domain::{PaymentId, PaymentRecord, PaymentStatus};
use payments_types::dto::{CreatePaymentRequest, ErrorResponse};
use utoipa::OpenApi;

// Dummy functions to generate path documentation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Submit a payment for settlement
///
/// Settles at most once per `Idempotency-Key`. Replaying a key returns the
/// first terminal result, including failures.
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    request_body = CreatePaymentRequest,
    params(
        ("Idempotency-Key" = String, Header, description = "Caller-chosen key; one settlement per key")
    ),
    responses(
        (status = 200, description = "Payment completed (or replayed)", body = PaymentRecord),
        (status = 400, description = "Missing Idempotency-Key or invalid body", body = ErrorResponse, example = json!({"error": "Idempotency-Key is required"})),
        (status = 403, description = "Wallet signature did not verify", body = ErrorResponse, example = json!({"error": "Invalid wallet signature"})),
        (status = 409, description = "Key reused for another order, or payment still in flight", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Settlement failed (replayed identically)", body = ErrorResponse, example = json!({"error": "Payment failed", "details": "Quote unavailable: Service unavailable: quote failed after 3 attempt(s)"}))
    )
)]
async fn create_payment() {}

/// OpenAPI documentation for the settlement API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Settlement Orchestrator API",
        version = "1.0.0",
        description = "Idempotent payment settlement through an external swap provider.\n\n## Authentication\n\nEach request carries the payer's base58 Ed25519 public key, a nonce, and a base58 signature over:\n\n```\nSign this message to authenticate: <nonce>\n```",
        license(name = "MIT"),
    ),
    paths(health, create_payment),
    components(
        schemas(
            CreatePaymentRequest,
            PaymentRecord,
            PaymentStatus,
            PaymentId,
            ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "payments", description = "Payment settlement"),
    )
)]
pub struct ApiDoc;
