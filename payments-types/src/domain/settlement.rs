//! Settlement domain model: quotes, instructions and receipts.
//!
//! None of these values are persisted on their own; they live for the
//! duration of a single settlement attempt.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Execution tolerance in basis points, already clamped to its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlippageTolerance(u32);

impl SlippageTolerance {
    /// Clamps a raw basis-point value into `[min_bps, max_bps]`.
    /// Inverted bounds are swapped.
    pub fn clamped(raw_bps: i64, min_bps: u32, max_bps: u32) -> Self {
        let (low, high) = if min_bps <= max_bps {
            (min_bps, max_bps)
        } else {
            (max_bps, min_bps)
        };
        let clamped = raw_bps.clamp(i64::from(low), i64::from(high));
        Self(clamped as u32)
    }

    pub fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SlippageTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// Parameters of a price request to the swap provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_asset: String,
    pub output_asset: String,
    pub amount: Decimal,
    pub tolerance: SlippageTolerance,
}

/// A provider's price for converting `in_amount` of one asset into another.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub input_asset: String,
    pub output_asset: String,
    pub in_amount: Decimal,
    pub out_amount: Decimal,
    pub price: Decimal,
    /// Percent; absent when the provider did not report one.
    pub price_impact_pct: Option<Decimal>,
    pub tolerance: SlippageTolerance,
    /// Provider payload, echoed back verbatim when building the instruction.
    pub raw: serde_json::Value,
}

/// Fee knobs forwarded to the instruction builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeParameters {
    pub priority_fee: u64,
    pub max_tolerance_bps: u32,
}

/// Request for a provider-constructed settlement instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub quote: Quote,
    pub recipient_identity: String,
    /// Single-use value so a resubmitted build cannot yield a replayable instruction.
    pub anti_replay_token: String,
    pub fee_parameters: FeeParameters,
}

/// Unsigned instruction bytes as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementInstruction {
    pub payload: Vec<u8>,
}

/// Instruction plus the custodial signature over its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInstruction {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
    pub signer: String,
}

/// Confirmation depth requested from the settlement network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Commitment::Processed),
            "confirmed" => Some(Commitment::Confirmed),
            "finalized" => Some(Commitment::Finalized),
            _ => None,
        }
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the network currently knows about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Reached(Commitment),
    Failed(String),
}

impl ConfirmationStatus {
    pub fn satisfies(&self, wanted: Commitment) -> bool {
        matches!(self, ConfirmationStatus::Reached(level) if *level >= wanted)
    }
}

/// States of a single settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    Created,
    QuoteRequested,
    TransactionBuilt,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

impl std::fmt::Display for SettlementStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SettlementStage::Created => "created",
            SettlementStage::QuoteRequested => "quote_requested",
            SettlementStage::TransactionBuilt => "transaction_built",
            SettlementStage::Signed => "signed",
            SettlementStage::Submitted => "submitted",
            SettlementStage::Confirmed => "confirmed",
            SettlementStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a confirmed settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub external_transaction_id: String,
    pub out_amount: Decimal,
    pub exchange_rate: Decimal,
    pub price_impact_pct: Decimal,
    pub tolerance_bps: u32,
}
