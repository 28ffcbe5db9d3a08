//! Seams between the quote aggregator and the upstream data sources.
//!
//! Every trait here is implemented by an adapter in `stablehop-sources`. Adapters own their
//! caches; the aggregator only sees these interfaces, which keeps it testable against mocks.
use async_trait::async_trait;

use crate::{
    errors::QuoteError,
    models::{Asset, BridgeStatus, DepegRisk, SwapQuote},
};

/// Executed-price quotes and the pool reference price from a DEX.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait SwapQuoteSource: Send + Sync {
    /// Quotes swapping `amount_in` (in stablecoin units) with the given slippage tolerance.
    async fn get_swap_quote(
        &self,
        amount_in: f64,
        slippage_bps: u32,
    ) -> Result<SwapQuote, QuoteError>;

    /// Current pool price of the same pair, used as the pre-trade reference.
    async fn get_reference_price(&self) -> Result<f64, QuoteError>;
}

/// Gas market on the source chain.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait GasPriceSource: Send + Sync {
    /// Current gas price in gwei.
    async fn get_gas_price(&self) -> Result<f64, QuoteError>;

    /// Gas units a transfer of `amount_in` stablecoin units is expected to consume, margin
    /// included.
    async fn estimate_gas_for_amount(&self, amount_in: f64) -> Result<u64, QuoteError>;
}

/// Network fee on the destination chain.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait SettlementFeeSource: Send + Sync {
    /// Fee of a minimal reference transaction, in whole native units.
    async fn get_settlement_fee(&self) -> Result<f64, QuoteError>;
}

/// Spot USD prices.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, asset: Asset) -> Result<f64, QuoteError>;

    /// Depeg assessment of `stablecoin` against its 1 USD peg.
    ///
    /// Relies on the caching behaviour of [`PriceOracle::get_price`].
    async fn get_depeg_risk(
        &self,
        stablecoin: Asset,
        threshold: f64,
    ) -> Result<DepegRisk, QuoteError> {
        let price = self.get_price(stablecoin).await?;
        Ok(DepegRisk::assess(price, threshold))
    }
}

/// Confirmation latency on both chains.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait ConfirmationTimeSource: Send + Sync {
    /// Seconds until a source chain transaction paying `gas_price_gwei` confirms.
    async fn estimate_source_chain_time(&self, gas_price_gwei: f64) -> Result<f64, QuoteError>;

    /// Average block interval on the destination chain, in seconds.
    async fn estimate_destination_chain_time(&self) -> Result<f64, QuoteError>;
}

/// Health of the cross-chain message relay.
///
/// Infallible: implementations degrade to a fallback status instead of
/// failing.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait BridgeHealthSource: Send + Sync {
    async fn get_bridge_status(&self) -> BridgeStatus;
}

/// Volatility of an asset over a time horizon.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait VolatilitySource: Send + Sync {
    /// Volatility of `asset` scaled to `time_horizon_sec`.
    async fn get_volatility(&self, asset: Asset, time_horizon_sec: f64)
        -> Result<f64, QuoteError>;
}

/// Opaque statistical model turning a daily price series into a one-day volatility estimate.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait VolatilityModel: Send + Sync {
    async fn estimate_daily_volatility(&self, prices: &[f64]) -> Result<f64, QuoteError>;
}
