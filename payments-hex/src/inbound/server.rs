//! HTTP Server configuration and startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use payments_types::{IdempotencyCache, PaymentRecordStore};

use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::PaymentService;
use crate::openapi::ApiDoc;

/// HTTP Server for the Payments API.
pub struct HttpServer<R: PaymentRecordStore, C: IdempotencyCache> {
    state: Arc<AppState<R, C>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: PaymentRecordStore, C: IdempotencyCache> HttpServer<R, C> {
    /// Creates a new HTTP server with the default limit of 100 requests per minute.
    pub fn new(service: PaymentService<R, C>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()),
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: PaymentService<R, C>, requests_per_minute: u32) -> Self {
        Self::with_limiter(
            service,
            RateLimiterState::new(requests_per_minute, Duration::from_secs(60)),
        )
    }

    /// Creates a new HTTP server with a preconfigured limiter, e.g. one that
    /// trusts a reverse proxy's `X-Forwarded-For`.
    pub fn with_limiter(service: PaymentService<R, C>, limiter: RateLimiterState) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(limiter),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        let api = Router::new()
            .route("/health", get(handlers::health))
            .route("/payments", post(handlers::create_payment::<R, C>))
            .with_state(self.state.clone());

        api.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        // Peer addresses key the rate limiter.
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
