//! Payments CLI
//!
//! Command-line interface for the settlement API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use payments_client::{ClientError, PayerKey, PaymentDraft, PaymentsClient};

#[derive(Parser)]
#[command(name = "payments")]
#[command(author, version, about = "Settlement API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Payments API
    #[arg(
        long,
        env = "PAYMENTS_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a payer keypair
    Keygen,
    /// Sign and submit a payment
    Pay {
        /// Base58 payer keypair (or 32-byte seed)
        #[arg(long, env = "PAYER_KEYPAIR", hide_env_values = true)]
        keypair: String,
        #[arg(long)]
        order_id: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "USDC")]
        source_asset: String,
        #[arg(long, default_value = "SOL")]
        destination_asset: String,
        /// Card processor payment method id, for fiat source assets
        #[arg(long)]
        payment_method: Option<String>,
        /// Reuse to retry safely; a fresh UUID is generated when omitted
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Check API health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = PaymentsClient::new(&cli.api_url);

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Keygen => {
            let payer = PayerKey::generate();
            println!("Identity: {}", payer.identity());
            println!("Keypair:  {}", payer.to_base58());
        }

        Commands::Pay {
            keypair,
            order_id,
            amount,
            source_asset,
            destination_asset,
            payment_method,
            idempotency_key,
        } => {
            let payer = PayerKey::from_base58(&keypair)?;
            let key = idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
            eprintln!("Idempotency-Key: {}", key);

            let draft = PaymentDraft {
                order_id,
                amount,
                source_asset,
                destination_asset,
                payment_method,
            };
            match client.submit_payment(&key, &payer, draft).await {
                Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                Err(ClientError::Api {
                    status,
                    message,
                    details,
                }) => {
                    let body = serde_json::json!({ "error": message, "details": details });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    anyhow::bail!("payment rejected with status {}", status);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
