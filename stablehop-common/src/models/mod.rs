pub mod bridge;
pub mod quote;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub use bridge::{BridgeHealth, BridgeStatus};
pub use quote::{DepegRisk, OraclePrices, PriceRange, Quote, SwapQuote};

/// Assets the quoter needs USD prices or price history for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Asset {
    Usdt,
    Usdc,
    Eth,
    Sol,
}

impl Asset {
    /// Identifier of the asset on the spot price API.
    pub fn price_id(&self) -> &'static str {
        match self {
            Asset::Usdt => "tether",
            Asset::Usdc => "usd-coin",
            Asset::Eth => "ethereum",
            Asset::Sol => "solana",
        }
    }
}

/// Assigns a concrete asset to each role of the transfer route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteAssets {
    /// Stablecoin the user sends on the source chain.
    pub source_stable: Asset,
    /// Stablecoin the user receives on the destination chain. Quote currency.
    pub dest_stable: Asset,
    /// Asset gas is paid in on the source chain.
    pub source_native: Asset,
    /// Asset fees are paid in on the destination chain.
    pub dest_native: Asset,
    /// Asset whose volatility drives the risk band.
    pub settlement: Asset,
}

impl Default for RouteAssets {
    fn default() -> Self {
        Self {
            source_stable: Asset::Usdt,
            dest_stable: Asset::Usdt,
            source_native: Asset::Eth,
            dest_native: Asset::Sol,
            settlement: Asset::Usdt,
        }
    }
}
