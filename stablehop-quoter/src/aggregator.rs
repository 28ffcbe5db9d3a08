//! Fans out to every data source and folds the results into a single [`Quote`].
use std::{future::Future, sync::Arc};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stablehop_common::{
    models::{Asset, OraclePrices, PriceRange, Quote, RouteAssets},
    traits::{
        BridgeHealthSource, ConfirmationTimeSource, GasPriceSource, PriceOracle,
        SettlementFeeSource, SwapQuoteSource, VolatilitySource,
    },
    QuoteError, SourceKind,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Tunable constants of the quote computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteParameters {
    /// Slippage tolerance requested from the DEX.
    pub slippage_bps: u32,
    /// Deviation from the 1 USD peg above which the source stablecoin is flagged.
    pub depeg_threshold: f64,
    /// Expected time for the bridge to relay the transfer.
    pub bridge_transfer_time_sec: f64,
    /// Width of the price band in standard deviations.
    pub z_score: f64,
    pub gwei_per_native: f64,
}

impl Default for QuoteParameters {
    fn default() -> Self {
        Self {
            slippage_bps: 50,
            depeg_threshold: 0.005,
            bridge_transfer_time_sec: 1200.0,
            z_score: 2.0,
            gwei_per_native: 1e9,
        }
    }
}

/// One handle per data source. Handles are shared, so one set can serve several aggregators.
#[derive(Clone)]
pub struct QuoteSources {
    pub swap: Arc<dyn SwapQuoteSource>,
    pub gas: Arc<dyn GasPriceSource>,
    pub settlement: Arc<dyn SettlementFeeSource>,
    pub prices: Arc<dyn PriceOracle>,
    pub confirmation: Arc<dyn ConfirmationTimeSource>,
    pub bridge: Arc<dyn BridgeHealthSource>,
    pub volatility: Arc<dyn VolatilitySource>,
}

pub struct QuoteAggregator {
    sources: QuoteSources,
    route: RouteAssets,
    params: QuoteParameters,
}

async fn timed<T, F>(source: SourceKind, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    debug!(%source, elapsed_ms = start.elapsed().as_millis() as u64, "SourceFetched");
    out
}

impl QuoteAggregator {
    pub fn new(sources: QuoteSources, route: RouteAssets, params: QuoteParameters) -> Self {
        Self { sources, route, params }
    }

    pub fn route(&self) -> &RouteAssets {
        &self.route
    }

    pub fn params(&self) -> &QuoteParameters {
        &self.params
    }

    async fn price(&self, asset: Asset) -> Result<f64, QuoteError> {
        timed(SourceKind::PriceOracle, self.sources.prices.get_price(asset)).await
    }

    async fn oracle_prices(&self) -> Result<OraclePrices, QuoteError> {
        let route = &self.route;
        let (source_stable_usd, dest_stable_usd, source_native_usd, dest_native_usd) =
            tokio::try_join!(
                self.price(route.source_stable),
                self.price(route.dest_stable),
                self.price(route.source_native),
                self.price(route.dest_native),
            )?;
        Ok(OraclePrices { source_stable_usd, dest_stable_usd, source_native_usd, dest_native_usd })
    }

    /// Quotes transferring `amount_in` units of the source stablecoin.
    ///
    /// Every source must answer, the first failure aborts the computation and is returned
    /// unchanged. Bridge health is the exception: its adapter reports a fallback status
    /// instead of failing.
    #[instrument(name = "quote.compute", skip(self), fields(route = ?self.route))]
    pub async fn compute_quote(&self, amount_in: f64) -> Result<Quote, QuoteError> {
        if !(amount_in.is_finite() && amount_in > 0.0) {
            return Err(QuoteError::Validation(format!(
                "amount_in must be a positive number, got {amount_in}"
            )));
        }
        let params = &self.params;
        let sources = &self.sources;

        let (swap, price_init, gas_price_gwei, settlement_fee_native, prices) = tokio::try_join!(
            timed(
                SourceKind::SwapQuote,
                sources
                    .swap
                    .get_swap_quote(amount_in, params.slippage_bps)
            ),
            timed(SourceKind::ReferencePrice, sources.swap.get_reference_price()),
            timed(SourceKind::GasPrice, sources.gas.get_gas_price()),
            timed(SourceKind::SettlementFee, sources.settlement.get_settlement_fee()),
            self.oracle_prices(),
        )?;

        let amount_out = swap.amount_out;
        if !(amount_out.is_finite() && amount_out > 0.0) {
            return Err(QuoteError::invalid_data(
                SourceKind::SwapQuote,
                format!("output amount {amount_out}"),
            ));
        }
        let price_effective = amount_out / amount_in;
        let price_impact_manual = (price_effective - price_init) / price_init;
        let slippage_cost = amount_in * swap.slippage_bps as f64 / 10_000.0;
        let min_received_after_slippage = amount_out - slippage_cost;

        let (gas_units, confirmation_time_source_sec, confirmation_time_dest_sec, bridge_status) =
            tokio::try_join!(
                timed(SourceKind::GasEstimate, sources.gas.estimate_gas_for_amount(amount_in)),
                timed(
                    SourceKind::SourceConfirmationTime,
                    sources
                        .confirmation
                        .estimate_source_chain_time(gas_price_gwei)
                ),
                timed(
                    SourceKind::DestinationConfirmationTime,
                    sources
                        .confirmation
                        .estimate_destination_chain_time()
                ),
                timed(SourceKind::BridgeHealth, async {
                    Ok::<_, QuoteError>(sources.bridge.get_bridge_status().await)
                }),
            )?;

        let gas_cost_native = gas_price_gwei * gas_units as f64 / params.gwei_per_native;
        let gas_cost_quote = prices.source_native_to_quote(gas_cost_native);
        let settlement_fee_quote = prices.dest_native_to_quote(settlement_fee_native);
        let swap_fee_quote = swap.fee;
        let total_cost_quote = gas_cost_quote + settlement_fee_quote + swap_fee_quote;

        let bridge_transfer_time_sec = params.bridge_transfer_time_sec;
        let total_time_sec =
            confirmation_time_source_sec + bridge_transfer_time_sec + confirmation_time_dest_sec;

        let raw_volatility = timed(
            SourceKind::Volatility,
            sources
                .volatility
                .get_volatility(self.route.settlement, total_time_sec),
        )
        .await?;
        let adjusted_volatility = raw_volatility * price_effective;
        let price_range = PriceRange::around(amount_out, params.z_score, adjusted_volatility);

        let depeg_risk = timed(
            SourceKind::PriceOracle,
            sources
                .prices
                .get_depeg_risk(self.route.source_stable, params.depeg_threshold),
        )
        .await?;

        info!(
            amount_in,
            amount_out,
            total_cost_quote,
            total_time_sec,
            bridge = %bridge_status.status,
            depegged = depeg_risk.is_at_risk,
            "QuoteComputed"
        );

        Ok(Quote {
            amount_in,
            amount_out,
            price_init,
            price_effective,
            price_impact_manual,
            price_impact_reported: swap.price_impact_pct,
            slippage_bps: swap.slippage_bps,
            slippage_cost,
            min_received_after_slippage,
            gas_price_gwei,
            gas_units,
            gas_cost_native,
            gas_cost_quote,
            settlement_fee_native,
            settlement_fee_quote,
            swap_fee_quote,
            total_cost_quote,
            confirmation_time_source_sec,
            bridge_transfer_time_sec,
            confirmation_time_dest_sec,
            total_time_sec,
            raw_volatility,
            adjusted_volatility,
            z_score: params.z_score,
            price_range,
            bridge_status,
            depeg_risk,
            prices,
            quoted_at: Utc::now(),
        })
    }
}
