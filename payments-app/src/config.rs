//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_SWAP_API_URL: &str = "https://quote-api.jup.ag/v6";
const DEFAULT_FIAT_API_URL: &str = "https://api.stripe.com/v1";

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub swap_api_url: String,
    pub rpc_url: String,
    /// Base58 custodial key. Never logged.
    pub custodial_keypair: String,
    pub priority_fee: u64,
    pub confirm_timeout: Duration,
    pub rate_limit_per_minute: u32,
    /// Key rate limits by `X-Forwarded-For`; only safe behind a proxy that sets it.
    pub trust_forwarded_for: bool,
    /// Card processor rail; disabled when no secret key is configured.
    pub fiat: Option<FiatConfig>,
}

/// Card processor settings.
pub struct FiatConfig {
    pub api_url: String,
    /// Never logged.
    pub secret_key: String,
    /// Source assets charged through the processor.
    pub currencies: Vec<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", name))
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", 3000)?,
            database_url: required("DATABASE_URL")?,
            swap_api_url: lookup("SWAP_API_URL").unwrap_or_else(|| DEFAULT_SWAP_API_URL.into()),
            rpc_url: required("RPC_URL")?,
            custodial_keypair: required("CUSTODIAL_KEYPAIR")?,
            priority_fee: parse_or(&lookup, "PRIORITY_FEE", 0)?,
            confirm_timeout: Duration::from_secs(parse_or(&lookup, "CONFIRM_TIMEOUT_SECS", 60)?),
            rate_limit_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 100)?,
            trust_forwarded_for: parse_or(&lookup, "TRUST_FORWARDED_FOR", false)?,
            fiat: fiat_from_lookup(&lookup),
        })
    }
}

fn fiat_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Option<FiatConfig> {
    let secret_key = lookup("FIAT_SECRET_KEY").filter(|v| !v.trim().is_empty())?;
    let currencies = lookup("FIAT_CURRENCIES")
        .unwrap_or_else(|| "USD".into())
        .split(',')
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    Some(FiatConfig {
        api_url: lookup("FIAT_API_URL").unwrap_or_else(|| DEFAULT_FIAT_API_URL.into()),
        secret_key,
        currencies,
    })
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {}: {:?}", name, raw)),
        None => Ok(default),
    }
}
