//! Swap quotes and pool reference prices from the Raydium trade and pool APIs.
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use stablehop_common::{
    models::SwapQuote, traits::SwapQuoteSource, QuoteError, SourceKind, TtlCache,
};
use tracing::{debug, instrument};

use crate::{
    http::{endpoint, get_json},
    units::{from_base_units, to_base_units, Numeric},
};

const REFERENCE_PRICE_KEY: &str = "reference_price";

/// The two mints being swapped and their decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapPair {
    pub input_mint: String,
    pub output_mint: String,
    pub input_decimals: u8,
    pub output_decimals: u8,
}

#[derive(Debug, Deserialize)]
struct RaydiumResponse<T> {
    success: bool,
    #[serde(default, alias = "error")]
    msg: Option<String>,
    data: Option<T>,
}

impl<T> RaydiumResponse<T> {
    fn into_data(self, origin: SourceKind) -> Result<T, QuoteError> {
        if !self.success {
            let reason = self
                .msg
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(QuoteError::upstream(origin, format!("request unsuccessful: {reason}")));
        }
        self.data
            .ok_or_else(|| QuoteError::upstream(origin, "response carries no data"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputeSwap {
    output_amount: Numeric,
    price_impact_pct: f64,
    slippage_bps: u32,
    #[serde(default)]
    route_plan: Vec<RouteLeg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteLeg {
    fee_amount: Numeric,
}

#[derive(Debug, Deserialize)]
struct PoolPage {
    #[serde(default)]
    data: Vec<PoolInfo>,
}

#[derive(Debug, Deserialize)]
struct PoolInfo {
    price: f64,
}

pub struct RaydiumSwapSource {
    http: Client,
    trade_api: Url,
    pool_api: Url,
    pair: SwapPair,
    reference_cache: TtlCache<&'static str, f64>,
}

impl RaydiumSwapSource {
    pub fn new(
        http: Client,
        trade_api: Url,
        pool_api: Url,
        pair: SwapPair,
        reference_cache: TtlCache<&'static str, f64>,
    ) -> Self {
        Self { http, trade_api, pool_api, pair, reference_cache }
    }

    async fn fetch_reference_price(&self) -> Result<f64, QuoteError> {
        let origin = SourceKind::ReferencePrice;
        let mut url = endpoint(&self.pool_api, "pools/info/mint", origin)?;
        url.query_pairs_mut()
            .append_pair("mint1", &self.pair.input_mint)
            .append_pair("mint2", &self.pair.output_mint)
            .append_pair("poolType", "concentrated")
            .append_pair("poolSortField", "default")
            .append_pair("sortType", "desc")
            .append_pair("pageSize", "1")
            .append_pair("page", "1");

        let page = get_json::<RaydiumResponse<PoolPage>>(&self.http, url, origin)
            .await?
            .into_data(origin)?;
        let price = page
            .data
            .first()
            .map(|pool| pool.price)
            .ok_or_else(|| QuoteError::upstream(origin, "no pool found for pair"))?;

        if !(price.is_finite() && price > 0.0) {
            return Err(QuoteError::invalid_data(origin, format!("pool price {price}")));
        }
        debug!(price, "ReferencePriceFetched");
        Ok(price)
    }
}

#[async_trait]
impl SwapQuoteSource for RaydiumSwapSource {
    #[instrument(skip(self))]
    async fn get_swap_quote(
        &self,
        amount_in: f64,
        slippage_bps: u32,
    ) -> Result<SwapQuote, QuoteError> {
        let origin = SourceKind::SwapQuote;
        let mut url = endpoint(&self.trade_api, "compute/swap-base-in", origin)?;
        url.query_pairs_mut()
            .append_pair("inputMint", &self.pair.input_mint)
            .append_pair("outputMint", &self.pair.output_mint)
            .append_pair(
                "amount",
                &to_base_units(amount_in, self.pair.input_decimals).to_string(),
            )
            .append_pair("slippageBps", &slippage_bps.to_string())
            .append_pair("txVersion", "V0");

        let swap = get_json::<RaydiumResponse<ComputeSwap>>(&self.http, url, origin)
            .await?
            .into_data(origin)?;

        let amount_out = swap
            .output_amount
            .as_f64()
            .ok_or_else(|| {
                QuoteError::upstream(
                    origin,
                    format!("unparsable output amount {:?}", swap.output_amount),
                )
            })?;
        let fee = swap
            .route_plan
            .first()
            .ok_or_else(|| QuoteError::upstream(origin, "route plan is empty"))?
            .fee_amount
            .as_f64()
            .ok_or_else(|| QuoteError::upstream(origin, "unparsable route fee"))?;

        Ok(SwapQuote {
            amount_out: from_base_units(amount_out, self.pair.output_decimals),
            price_impact_pct: swap.price_impact_pct,
            fee: from_base_units(fee, self.pair.input_decimals),
            slippage_bps: swap.slippage_bps,
        })
    }

    #[instrument(skip(self))]
    async fn get_reference_price(&self) -> Result<f64, QuoteError> {
        self.reference_cache
            .get_or_fetch(REFERENCE_PRICE_KEY, || self.fetch_reference_price())
            .await
    }
}
