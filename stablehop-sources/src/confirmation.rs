//! Confirmation latency estimates for the source (Etherscan) and destination (Solana) chains.
use async_trait::async_trait;
use stablehop_common::{traits::ConfirmationTimeSource, QuoteError, SourceKind, TtlCache};
use tracing::instrument;

use crate::{
    etherscan::EtherscanClient,
    solana::{SolanaRpcClient, BLOCK_TIME_WINDOW},
};

const BLOCK_TIME_KEY: &str = "sol_blocktimes";

/// Confirmation latency from the Etherscan gas estimator and Solana block time sampling.
pub struct ChainConfirmationTimes {
    etherscan: EtherscanClient,
    solana: SolanaRpcClient,
    block_time_cache: TtlCache<&'static str, f64>,
}

impl ChainConfirmationTimes {
    pub fn new(
        etherscan: EtherscanClient,
        solana: SolanaRpcClient,
        block_time_cache: TtlCache<&'static str, f64>,
    ) -> Self {
        Self { etherscan, solana, block_time_cache }
    }
}

fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * 1e9).floor() as u128
}

#[async_trait]
impl ConfirmationTimeSource for ChainConfirmationTimes {
    #[instrument(skip(self))]
    async fn estimate_source_chain_time(&self, gas_price_gwei: f64) -> Result<f64, QuoteError> {
        if !(gas_price_gwei.is_finite() && gas_price_gwei > 0.0) {
            return Err(QuoteError::invalid_data(
                SourceKind::SourceConfirmationTime,
                format!("cannot estimate for gas price {gas_price_gwei} gwei"),
            ));
        }
        self.etherscan
            .gas_estimate(gwei_to_wei(gas_price_gwei))
            .await
    }

    #[instrument(skip(self))]
    async fn estimate_destination_chain_time(&self) -> Result<f64, QuoteError> {
        self.block_time_cache
            .get_or_fetch(BLOCK_TIME_KEY, || self.solana.average_block_time(BLOCK_TIME_WINDOW))
            .await
    }
}
