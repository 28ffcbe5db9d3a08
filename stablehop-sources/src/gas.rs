//! Source chain gas market: Etherscan gas oracle for prices, node simulations for gas units.
use alloy::{
    core::sol,
    primitives::{Address, U256},
    rpc::{
        client::ReqwestClient,
        types::{TransactionInput, TransactionRequest},
    },
    sol_types::SolCall,
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use stablehop_common::{traits::GasPriceSource, QuoteError, SourceKind, TtlCache};
use tracing::{debug, instrument};

use crate::{errors::SetupError, etherscan::EtherscanClient, units::to_base_units};

const GAS_PRICE_KEY: &str = "eth_gas";
/// Gas prices at or above this many gwei are treated as bogus.
const MAX_SANE_GAS_PRICE_GWEI: f64 = 1000.0;

sol! {
    function approve(address _spender, uint256 _value) public returns (bool success);
}

/// Contracts touched by the transfer on the source chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferContracts {
    /// ERC-20 token being bridged.
    pub token: Address,
    pub token_bridge: Address,
    pub token_decimals: u8,
}

impl TransferContracts {
    pub fn new(token: &str, token_bridge: &str, token_decimals: u8) -> Result<Self, SetupError> {
        let parse = |raw: &str| {
            raw.parse::<Address>()
                .map_err(|e| SetupError::InvalidAddress(raw.to_string(), e.to_string()))
        };
        Ok(Self { token: parse(token)?, token_bridge: parse(token_bridge)?, token_decimals })
    }

    fn approve_request(&self, base_units: u128) -> TransactionRequest {
        let approve = approveCall { _spender: self.token_bridge, _value: U256::from(base_units) };
        let calldata = approve.abi_encode();
        TransactionRequest::default()
            .from(Address::ZERO)
            .to(self.token)
            .input(TransactionInput::new(calldata.into()))
    }

    fn bridge_request(&self) -> TransactionRequest {
        TransactionRequest::default()
            .from(Address::ZERO)
            .to(self.token_bridge)
            .value(U256::ZERO)
    }
}

fn estimate_error(e: RpcError<TransportErrorKind>) -> QuoteError {
    let detail = match &e {
        RpcError::ErrorResp(payload) => {
            format!("failed with code {}: {}", payload.code, payload.message)
        }
        other => format!("failed: {other}"),
    };
    QuoteError::upstream(SourceKind::GasEstimate, format!("eth_estimateGas {detail}"))
}

pub struct EthereumGasSource {
    etherscan: EtherscanClient,
    rpc: ReqwestClient,
    contracts: TransferContracts,
    price_cache: TtlCache<&'static str, f64>,
    units_cache: TtlCache<u128, u64>,
}

impl EthereumGasSource {
    pub fn new(
        etherscan: EtherscanClient,
        rpc: ReqwestClient,
        contracts: TransferContracts,
        price_cache: TtlCache<&'static str, f64>,
        units_cache: TtlCache<u128, u64>,
    ) -> Self {
        Self { etherscan, rpc, contracts, price_cache, units_cache }
    }

    async fn fetch_gas_price(&self) -> Result<f64, QuoteError> {
        let oracle = self.etherscan.gas_oracle().await?;
        let price = oracle.preferred().unwrap_or(0.0);
        if !(price > 0.0 && price < MAX_SANE_GAS_PRICE_GWEI) {
            return Err(QuoteError::invalid_data(
                SourceKind::GasPrice,
                format!("gas price {price} gwei out of range"),
            ));
        }
        debug!(gwei = price, "GasPriceFetched");
        Ok(price)
    }

    async fn estimate(&self, tx: TransactionRequest) -> Result<u64, QuoteError> {
        let units: U256 = self
            .rpc
            .request("eth_estimateGas", (tx,))
            .await
            .map_err(estimate_error)?;
        u64::try_from(units).map_err(|_| {
            QuoteError::invalid_data(
                SourceKind::GasEstimate,
                format!("gas estimate {units} overflows u64"),
            )
        })
    }

    async fn simulate_transfer(&self, base_units: u128) -> Result<u64, QuoteError> {
        let (approve_gas, bridge_gas) = tokio::try_join!(
            self.estimate(self.contracts.approve_request(base_units)),
            self.estimate(self.contracts.bridge_request())
        )?;
        let total = approve_gas.saturating_add(bridge_gas);
        let with_margin = total.saturating_mul(6) / 5;
        debug!(approve_gas, bridge_gas, with_margin, "GasUnitsEstimated");
        Ok(with_margin)
    }
}

#[async_trait]
impl GasPriceSource for EthereumGasSource {
    #[instrument(skip(self))]
    async fn get_gas_price(&self) -> Result<f64, QuoteError> {
        self.price_cache
            .get_or_fetch(GAS_PRICE_KEY, || self.fetch_gas_price())
            .await
    }

    #[instrument(skip(self))]
    async fn estimate_gas_for_amount(&self, amount_in: f64) -> Result<u64, QuoteError> {
        let base_units = to_base_units(amount_in, self.contracts.token_decimals);
        self.units_cache
            .get_or_fetch(base_units, || self.simulate_transfer(base_units))
            .await
    }
}
