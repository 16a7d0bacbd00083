//! Settlement Executor
//!
//! Drives one settlement attempt through
//! `Created → QuoteRequested → TransactionBuilt → Signed → Submitted → Confirmed`,
//! stopping at the first fatal error. Submission is never repeated: once a
//! signed instruction has been handed to the network, the only follow-up is
//! polling its status.
//!
//! Payments whose source asset is a configured fiat currency take the card
//! processor rail instead: one confirmed payment intent, then polling.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use payments_types::{
    BuildRequest, Commitment, ConfirmationStatus, DomainError, FeeParameters, FiatProcessor,
    InstructionSigner, IntentStatus, PaymentIntent, PaymentIntentRequest, PaymentRequest,
    QuoteRequest, SettlementError, SettlementNetwork, SettlementReceipt, SettlementStage,
    SwapProvider, to_minor_units,
};

use crate::tolerance::ToleranceCalculator;

/// Knobs for a settlement attempt.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub commitment: Commitment,
    /// Ceiling on waiting for `commitment` after submission.
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
    pub priority_fee: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            priority_fee: 0,
        }
    }
}

/// Orchestrates quote, build, sign, submit and confirm.
///
/// The signer and network client are injected once and shared read-only
/// across concurrent attempts.
pub struct SettlementExecutor {
    provider: Arc<dyn SwapProvider>,
    network: Arc<dyn SettlementNetwork>,
    signer: Arc<dyn InstructionSigner>,
    tolerance: ToleranceCalculator,
    config: ExecutorConfig,
    fiat: Option<FiatRail>,
}

/// Card processor plus the (uppercase) source assets routed to it.
struct FiatRail {
    processor: Arc<dyn FiatProcessor>,
    currencies: Vec<String>,
}

fn stage(transition: SettlementStage, order_id: &str) {
    info!(stage = %transition, order_id, "Settlement stage reached");
}

impl SettlementExecutor {
    pub fn new(
        provider: Arc<dyn SwapProvider>,
        network: Arc<dyn SettlementNetwork>,
        signer: Arc<dyn InstructionSigner>,
        tolerance: ToleranceCalculator,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            network,
            signer,
            tolerance,
            config,
            fiat: None,
        }
    }

    /// Routes payments whose source asset is one of `currencies` to `processor`.
    pub fn with_fiat<I, S>(mut self, processor: Arc<dyn FiatProcessor>, currencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let currencies = currencies
            .into_iter()
            .map(|c| c.as_ref().trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        self.fiat = Some(FiatRail {
            processor,
            currencies,
        });
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn fiat_rail(&self, req: &PaymentRequest) -> Option<&FiatRail> {
        self.fiat.as_ref().filter(|rail| {
            rail.currencies
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&req.source_asset))
        })
    }

    /// Rejects requests the selected rail could never settle, before any
    /// record is written for them.
    pub fn validate(&self, req: &PaymentRequest) -> Result<(), DomainError> {
        if self.fiat_rail(req).is_none() {
            return Ok(());
        }
        if req.payment_method.is_none() {
            return Err(DomainError::ValidationError(format!(
                "paymentMethod is required for {} payments",
                req.source_asset
            )));
        }
        if to_minor_units(req.amount).is_none() {
            return Err(DomainError::ValidationError(format!(
                "amount has more than 2 decimal places for {}",
                req.source_asset
            )));
        }
        Ok(())
    }

    /// Runs one settlement attempt for `req`.
    #[tracing::instrument(skip(self, req), fields(order_id = %req.order_id, amount = %req.amount))]
    pub async fn execute(&self, req: &PaymentRequest) -> Result<SettlementReceipt, SettlementError> {
        let result = self.run(req).await;
        if let Err(e) = &result {
            if e.is_internal() {
                error!(stage = %e.stage(), error = %e, "Settlement failed on internal error");
            } else {
                warn!(stage = %e.stage(), error = %e, "Settlement failed");
            }
            stage(SettlementStage::Failed, &req.order_id);
        }
        result
    }

    async fn run(&self, req: &PaymentRequest) -> Result<SettlementReceipt, SettlementError> {
        stage(SettlementStage::Created, &req.order_id);
        if let Some(rail) = self.fiat_rail(req) {
            return self.run_fiat(rail.processor.as_ref(), req).await;
        }

        // Created → QuoteRequested
        let tolerance = self
            .tolerance
            .compute_tolerance(&req.source_asset, &req.destination_asset, req.amount)
            .await;
        let quote = self
            .provider
            .quote(&QuoteRequest {
                input_asset: req.source_asset.clone(),
                output_asset: req.destination_asset.clone(),
                amount: req.amount,
                tolerance,
            })
            .await
            .map_err(|e| SettlementError::QuoteUnavailable(e.to_string()))?;
        stage(SettlementStage::QuoteRequested, &req.order_id);

        // QuoteRequested → TransactionBuilt
        let build = BuildRequest {
            quote: quote.clone(),
            recipient_identity: req.payer_identity.clone(),
            anti_replay_token: Uuid::new_v4().to_string(),
            fee_parameters: FeeParameters {
                priority_fee: self.config.priority_fee,
                max_tolerance_bps: self.tolerance.config().max_bps,
            },
        };
        let instruction = self
            .provider
            .build(&build)
            .await
            .map_err(|e| SettlementError::BuildFailed(e.to_string()))?;
        stage(SettlementStage::TransactionBuilt, &req.order_id);

        // TransactionBuilt → Signed
        let signed = self
            .signer
            .sign(&instruction)
            .map_err(|e| SettlementError::Signing(e.to_string()))?;
        stage(SettlementStage::Signed, &req.order_id);

        // Signed → Submitted (single attempt)
        let transaction_id = self
            .network
            .submit(&signed, self.config.commitment)
            .await
            .map_err(|e| SettlementError::SubmissionFailed {
                reason: e.to_string(),
                transaction_id: self.network.transaction_id(&signed),
            })?;
        info!(
            stage = %SettlementStage::Submitted,
            order_id = %req.order_id,
            %transaction_id,
            "Settlement stage reached"
        );

        // Submitted → Confirmed
        self.await_confirmation(&transaction_id).await?;
        stage(SettlementStage::Confirmed, &req.order_id);

        Ok(SettlementReceipt {
            external_transaction_id: transaction_id,
            out_amount: quote.out_amount,
            exchange_rate: quote.price,
            price_impact_pct: quote.price_impact_pct.unwrap_or_default(),
            tolerance_bps: tolerance.bps(),
        })
    }

    /// Polls until the configured commitment is reached, the network reports
    /// failure, or the ceiling elapses.
    async fn await_confirmation(&self, transaction_id: &str) -> Result<(), SettlementError> {
        let wanted = self.config.commitment;
        let poll = async {
            loop {
                match self.network.status(transaction_id).await {
                    Ok(status) if status.satisfies(wanted) => return Ok(()),
                    Ok(ConfirmationStatus::Failed(reason)) => {
                        return Err(SettlementError::SubmissionFailed {
                            reason,
                            transaction_id: Some(transaction_id.to_string()),
                        });
                    }
                    Ok(_) => {}
                    // The instruction is already submitted; keep polling until the ceiling.
                    Err(e) => warn!(transaction_id, error = %e, "Status check failed"),
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.config.confirm_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(SettlementError::ConfirmationTimeout {
                transaction_id: transaction_id.to_string(),
                waited_secs: self.config.confirm_timeout.as_secs(),
            }),
        }
    }

    /// Charges the payment method in the source currency. The caller's
    /// idempotency key goes to the processor, so a repeated create cannot
    /// charge twice.
    async fn run_fiat(
        &self,
        processor: &dyn FiatProcessor,
        req: &PaymentRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let (Some(amount_minor), Some(payment_method)) =
            (to_minor_units(req.amount), req.payment_method.clone())
        else {
            return Err(SettlementError::BuildFailed(
                "fiat payment needs a payment method and a whole number of cents".into(),
            ));
        };
        let intent = processor
            .create_intent(&PaymentIntentRequest {
                amount_minor,
                currency: req.source_asset.to_ascii_lowercase(),
                payment_method,
                idempotency_key: req.idempotency_key.clone(),
                order_id: req.order_id.clone(),
            })
            .await
            .map_err(|e| SettlementError::SubmissionFailed {
                reason: e.to_string(),
                transaction_id: None,
            })?;
        info!(
            stage = %SettlementStage::Submitted,
            order_id = %req.order_id,
            transaction_id = %intent.id,
            "Settlement stage reached"
        );

        let transaction_id = intent.id.clone();
        self.await_intent(processor, intent).await?;
        stage(SettlementStage::Confirmed, &req.order_id);

        Ok(SettlementReceipt {
            external_transaction_id: transaction_id,
            out_amount: req.amount,
            exchange_rate: Decimal::ONE,
            price_impact_pct: Decimal::ZERO,
            tolerance_bps: 0,
        })
    }

    /// Polls a `processing` intent until it settles or the ceiling elapses.
    async fn await_intent(
        &self,
        processor: &dyn FiatProcessor,
        mut intent: PaymentIntent,
    ) -> Result<(), SettlementError> {
        let id = intent.id.clone();
        let poll = async move {
            loop {
                match intent.status {
                    IntentStatus::Succeeded => return Ok(()),
                    IntentStatus::Failed(reason) => {
                        return Err(SettlementError::SubmissionFailed {
                            reason,
                            transaction_id: Some(intent.id),
                        });
                    }
                    IntentStatus::RequiresAction => {
                        return Err(SettlementError::SubmissionFailed {
                            reason: "payment requires customer action".into(),
                            transaction_id: Some(intent.id),
                        });
                    }
                    IntentStatus::Processing => {}
                }
                tokio::time::sleep(self.config.poll_interval).await;
                intent = loop {
                    match processor.retrieve_intent(&intent.id).await {
                        Ok(latest) => break latest,
                        Err(e) => {
                            warn!(transaction_id = %intent.id, error = %e, "Intent lookup failed");
                            tokio::time::sleep(self.config.poll_interval).await;
                        }
                    }
                };
            }
        };

        match tokio::time::timeout(self.config.confirm_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(SettlementError::ConfirmationTimeout {
                transaction_id: id,
                waited_secs: self.config.confirm_timeout.as_secs(),
            }),
        }
    }
}
