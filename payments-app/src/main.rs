//! # Payments Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the record store and idempotency cache
//! - Build the outbound providers and the settlement executor
//! - Create the payment service
//! - Start the HTTP server

mod config;

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payments_hex::{
    ExecutorConfig, PaymentService, SettlementExecutor, ToleranceCalculator, ToleranceConfig,
    inbound::{HttpServer, RateLimiterState},
};
use payments_repo::{MemoryCache, build_repo};
use payments_types::InstructionSigner;
use settlement_providers::{
    Ed25519Signer, HttpFiatProcessor, HttpSwapProvider, RetryPolicy, RetryingClient, RpcNetwork,
};

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(300);

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("payments-service"), provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer()?;
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,payments_app=debug,payments_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting payments server on port {}", config.port);
    tracing::info!("Swap provider: {}", config.swap_api_url);
    tracing::info!("Settlement network: {}", config.rpc_url);

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    // Outbound adapters share one retrying HTTP client
    let http = RetryingClient::new(RetryPolicy::default());
    let provider = Arc::new(HttpSwapProvider::new(&config.swap_api_url, http.clone()));
    let network = Arc::new(RpcNetwork::new(&config.rpc_url, http.clone()));
    let signer = Ed25519Signer::from_base58(&config.custodial_keypair)?;
    tracing::info!("Custodial identity: {}", signer.identity());

    let mut executor = SettlementExecutor::new(
        provider.clone(),
        network,
        Arc::new(signer),
        ToleranceCalculator::new(provider, ToleranceConfig::default()),
        ExecutorConfig {
            confirm_timeout: config.confirm_timeout,
            priority_fee: config.priority_fee,
            ..ExecutorConfig::default()
        },
    );
    if let Some(fiat) = &config.fiat {
        tracing::info!(currencies = ?fiat.currencies, "Card processor: {}", fiat.api_url);
        let processor = HttpFiatProcessor::new(&fiat.api_url, &fiat.secret_key, http);
        executor = executor.with_fiat(Arc::new(processor), &fiat.currencies);
    }

    // Create the payment service
    let service = PaymentService::new(repo, MemoryCache::new(), executor);

    let cache = service.cache();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired idempotency entries");
            }
        }
    });

    // Create and run the HTTP server
    let limiter = RateLimiterState::new(config.rate_limit_per_minute, Duration::from_secs(60))
        .trust_forwarded_for(config.trust_forwarded_for);
    let server = HttpServer::with_limiter(service, limiter);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}
