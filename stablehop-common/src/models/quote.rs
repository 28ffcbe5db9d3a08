use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BridgeStatus;

/// Executed-price quote returned by the DEX, in stablecoin units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub amount_out: f64,
    /// Price impact as reported by the DEX, in percent.
    pub price_impact_pct: f64,
    pub fee: f64,
    pub slippage_bps: u32,
}

/// Spot USD prices used to convert native fees into the quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OraclePrices {
    pub source_stable_usd: f64,
    pub dest_stable_usd: f64,
    pub source_native_usd: f64,
    pub dest_native_usd: f64,
}

impl OraclePrices {
    /// Converts an amount of the source chain's native asset into quote currency.
    pub fn source_native_to_quote(&self, amount: f64) -> f64 {
        amount * self.source_native_usd / self.dest_stable_usd
    }

    /// Converts an amount of the destination chain's native asset into quote currency.
    pub fn dest_native_to_quote(&self, amount: f64) -> f64 {
        amount * self.dest_native_usd / self.dest_stable_usd
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub lower: f64,
    pub upper: f64,
}

impl PriceRange {
    /// Symmetric confidence band of `z_score` standard deviations around `amount_out`.
    pub fn around(amount_out: f64, z_score: f64, adjusted_volatility: f64) -> Self {
        let spread = z_score * adjusted_volatility;
        Self { lower: amount_out * (1.0 - spread), upper: amount_out * (1.0 + spread) }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// How far the source stablecoin trades from its 1 USD peg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepegRisk {
    pub oracle_price: f64,
    pub deviation: f64,
    pub is_at_risk: bool,
}

impl DepegRisk {
    pub const DEFAULT_THRESHOLD: f64 = 0.005;

    pub fn assess(oracle_price: f64, threshold: f64) -> Self {
        let deviation = (oracle_price - 1.0).abs();
        Self { oracle_price, deviation, is_at_risk: deviation > threshold }
    }
}

/// All-in cost, timing and risk of one cross-chain stablecoin transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub amount_in: f64,
    pub amount_out: f64,

    pub price_init: f64,
    pub price_effective: f64,
    pub price_impact_manual: f64,
    pub price_impact_reported: f64,

    pub slippage_bps: u32,
    pub slippage_cost: f64,
    pub min_received_after_slippage: f64,

    pub gas_price_gwei: f64,
    pub gas_units: u64,
    pub gas_cost_native: f64,
    pub gas_cost_quote: f64,
    pub settlement_fee_native: f64,
    pub settlement_fee_quote: f64,
    pub swap_fee_quote: f64,
    pub total_cost_quote: f64,

    pub confirmation_time_source_sec: f64,
    pub bridge_transfer_time_sec: f64,
    pub confirmation_time_dest_sec: f64,
    pub total_time_sec: f64,

    pub raw_volatility: f64,
    pub adjusted_volatility: f64,
    pub z_score: f64,
    pub price_range: PriceRange,

    pub bridge_status: BridgeStatus,
    pub depeg_risk: DepegRisk,
    pub prices: OraclePrices,
    pub quoted_at: DateTime<Utc>,
}
