//! Dynamic slippage tolerance.
//!
//! Tolerance widens with order size and with the price impact the provider
//! reports for a reference quote. It never blocks a settlement: whenever the
//! reference quote cannot be obtained the configured default is used.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};

use payments_types::{QuoteRequest, SlippageTolerance, SwapProvider};

/// Bounds and coefficients of the tolerance formula.
#[derive(Debug, Clone)]
pub struct ToleranceConfig {
    pub min_bps: u32,
    pub max_bps: u32,
    /// Used when no reference quote is available.
    pub default_bps: u32,
    /// Amounts above this use `large_base_pct`.
    pub size_threshold: Decimal,
    pub small_base_pct: Decimal,
    pub large_base_pct: Decimal,
    pub impact_multiplier: Decimal,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            min_bps: 50,
            max_bps: 300,
            default_bps: 100,
            size_threshold: Decimal::from(1000),
            small_base_pct: Decimal::new(5, 1),
            large_base_pct: Decimal::ONE,
            impact_multiplier: Decimal::new(15, 1),
        }
    }
}

impl ToleranceConfig {
    pub fn default_tolerance(&self) -> SlippageTolerance {
        SlippageTolerance::clamped(i64::from(self.default_bps), self.min_bps, self.max_bps)
    }

    /// `clamp(round((base + impact * multiplier) * 100), min, max)`.
    ///
    /// Missing or negative impact counts as zero.
    pub fn tolerance_for(&self, amount: Decimal, price_impact_pct: Option<Decimal>) -> SlippageTolerance {
        let base = if amount > self.size_threshold {
            self.large_base_pct
        } else {
            self.small_base_pct
        };
        let impact = price_impact_pct.unwrap_or_default().max(Decimal::ZERO);

        // Overflow only happens for absurd impacts; those saturate to max.
        let bps = impact
            .checked_mul(self.impact_multiplier)
            .and_then(|amplified| amplified.checked_add(base))
            .and_then(|pct| pct.checked_mul(Decimal::ONE_HUNDRED))
            .and_then(|raw| {
                raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .to_i64()
            })
            .unwrap_or(i64::MAX);

        SlippageTolerance::clamped(bps, self.min_bps, self.max_bps)
    }
}

/// Computes per-request tolerance from a live reference quote.
pub struct ToleranceCalculator {
    provider: Arc<dyn SwapProvider>,
    config: ToleranceConfig,
}

impl ToleranceCalculator {
    pub fn new(provider: Arc<dyn SwapProvider>, config: ToleranceConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ToleranceConfig {
        &self.config
    }

    /// Never fails; provider errors fall back to the default tolerance.
    #[tracing::instrument(skip(self))]
    pub async fn compute_tolerance(
        &self,
        source_asset: &str,
        destination_asset: &str,
        amount: Decimal,
    ) -> SlippageTolerance {
        let reference = QuoteRequest {
            input_asset: source_asset.to_string(),
            output_asset: destination_asset.to_string(),
            amount,
            tolerance: self.config.default_tolerance(),
        };

        match self.provider.quote(&reference).await {
            Ok(quote) => {
                let tolerance = self.config.tolerance_for(amount, quote.price_impact_pct);
                debug!(
                    %tolerance,
                    price_impact_pct = ?quote.price_impact_pct,
                    "Computed dynamic tolerance"
                );
                tolerance
            }
            Err(e) => {
                let fallback = self.config.default_tolerance();
                warn!(error = %e, %fallback, "Reference quote failed, using default tolerance");
                fallback
            }
        }
    }
}
