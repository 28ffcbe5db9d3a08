//! # stablehop sources
//!
//! Adapters for every upstream the quoter consults. Low-level clients (`etherscan`, `rpc`,
//! `solana`, `coingecko`) speak the wire protocols; the source adapters built on top of them
//! implement the traits of [`stablehop_common::traits`] and own their TTL caches.
#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod coingecko;
pub mod confirmation;
pub mod errors;
pub mod etherscan;
pub mod gas;
pub mod http;
pub mod raydium;
pub mod rpc;
pub mod solana;
pub mod volatility;
pub mod wormholescan;

mod units;

pub use coingecko::{CoinGeckoClient, CoinGeckoPriceOracle};
pub use confirmation::ChainConfirmationTimes;
pub use errors::SetupError;
pub use etherscan::EtherscanClient;
pub use gas::{EthereumGasSource, TransferContracts};
pub use raydium::{RaydiumSwapSource, SwapPair};
pub use rpc::JsonRpcClient;
pub use solana::{SolanaRpcClient, SolanaSettlementFee};
pub use volatility::{HistoricalVolatilitySource, ProcessVolatilityModel};
pub use wormholescan::WormholescanBridgeHealth;
