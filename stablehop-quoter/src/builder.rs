//! Builds every upstream adapter from a [`QuoterConfig`] and wires them into a
//! [`QuoteAggregator`].
use std::{sync::Arc, time::Duration};

use alloy::rpc::client::ClientBuilder;
use stablehop_common::{traits::VolatilityModel, TtlCache};
use stablehop_sources::{
    http::{build_client, parse_base_url},
    ChainConfirmationTimes, CoinGeckoClient, CoinGeckoPriceOracle, EthereumGasSource,
    EtherscanClient, HistoricalVolatilitySource, JsonRpcClient, ProcessVolatilityModel,
    RaydiumSwapSource, SolanaRpcClient, SolanaSettlementFee, SwapPair, TransferContracts,
    WormholescanBridgeHealth,
};
use tracing::info;

use crate::{
    aggregator::{QuoteAggregator, QuoteSources},
    config::{ConfigError, QuoterConfig},
};

pub struct QuoterBuilder {
    config: QuoterConfig,
    model: Option<Arc<dyn VolatilityModel>>,
}

impl QuoterBuilder {
    pub fn new(config: QuoterConfig) -> Self {
        Self { config, model: None }
    }

    /// Replaces the process-backed volatility model.
    pub fn model(mut self, model: Arc<dyn VolatilityModel>) -> Self {
        self.model = Some(model);
        self
    }

    fn ttl(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    pub fn build(self) -> Result<QuoteAggregator, ConfigError> {
        let QuoterConfig {
            endpoints,
            api_keys,
            contracts,
            cache,
            timeouts,
            model: model_config,
            bridge,
            route,
            parameters,
        } = self.config;

        let http = build_client(timeouts.http())?;
        let bridge_http = build_client(timeouts.bridge_health())?;

        let etherscan = EtherscanClient::new(
            http.clone(),
            parse_base_url(&endpoints.etherscan)?,
            api_keys.etherscan_key(),
            contracts.chain_id,
        );
        let ethereum = ClientBuilder::default()
            .http_with_client(http.clone(), parse_base_url(&endpoints.ethereum_rpc)?);
        let solana = SolanaRpcClient::new(JsonRpcClient::new(
            http.clone(),
            parse_base_url(&endpoints.solana_rpc)?,
        ));
        let coingecko = CoinGeckoClient::new(
            http.clone(),
            parse_base_url(&endpoints.coingecko)?,
            api_keys.coingecko,
        );

        let swap = RaydiumSwapSource::new(
            http.clone(),
            parse_base_url(&endpoints.raydium_trade_api)?,
            parse_base_url(&endpoints.raydium_pool_api)?,
            SwapPair {
                input_mint: contracts.input_mint.clone(),
                output_mint: contracts.output_mint.clone(),
                input_decimals: contracts.input_decimals,
                output_decimals: contracts.output_decimals,
            },
            TtlCache::new("reference_price", Self::ttl(cache.reference_price_secs)),
        );
        let gas = EthereumGasSource::new(
            etherscan.clone(),
            ethereum,
            TransferContracts::new(
                &contracts.token,
                &contracts.token_bridge,
                contracts.token_decimals,
            )?,
            TtlCache::new("gas_price", Self::ttl(cache.gas_price_secs)),
            TtlCache::new("gas_units", Self::ttl(cache.gas_units_secs)),
        );
        let settlement = SolanaSettlementFee::new(
            solana.clone(),
            TtlCache::new("settlement_fee", Self::ttl(cache.settlement_fee_secs)),
        );
        let prices = CoinGeckoPriceOracle::new(
            coingecko.clone(),
            TtlCache::new("spot_prices", Self::ttl(cache.spot_prices_secs)),
        );
        let confirmation = ChainConfirmationTimes::new(
            etherscan,
            solana,
            TtlCache::new("block_time", Self::ttl(cache.block_time_secs)),
        );
        let bridge_health = WormholescanBridgeHealth::new(
            bridge_http,
            parse_base_url(&endpoints.wormholescan)?,
            chrono::Duration::seconds(bridge.freshness_secs),
        );
        let model: Arc<dyn VolatilityModel> = match self.model {
            Some(model) => model,
            None => Arc::new(ProcessVolatilityModel::new(
                model_config.command,
                model_config.args,
                timeouts.model(),
            )),
        };
        let volatility = HistoricalVolatilitySource::new(
            coingecko,
            model,
            model_config.history_days,
            TtlCache::new("volatility", Self::ttl(cache.volatility_secs)),
        );

        info!(?route, ?parameters, "QuoterConfigured");
        Ok(QuoteAggregator::new(
            QuoteSources {
                swap: Arc::new(swap),
                gas: Arc::new(gas),
                settlement: Arc::new(settlement),
                prices: Arc::new(prices),
                confirmation: Arc::new(confirmation),
                bridge: Arc::new(bridge_health),
                volatility: Arc::new(volatility),
            },
            route,
            parameters,
        ))
    }
}
