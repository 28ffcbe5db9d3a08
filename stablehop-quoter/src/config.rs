use std::{env, fs::File, io::Read, time::Duration};

use serde::Deserialize;
use stablehop_common::models::RouteAssets;
use stablehop_sources::SetupError;
use thiserror::Error;

use crate::aggregator::QuoteParameters;

pub const ETHERSCAN_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(String, #[source] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Setup(#[from] SetupError),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct QuoterConfig {
    pub endpoints: Endpoints,
    pub api_keys: ApiKeys,
    pub contracts: Contracts,
    pub cache: CacheTtls,
    pub timeouts: Timeouts,
    pub model: ModelConfig,
    pub bridge: BridgeConfig,
    pub route: RouteAssets,
    pub parameters: QuoteParameters,
}

impl QuoterConfig {
    pub fn from_yaml(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path).map_err(|e| ConfigError::Read(path.to_string(), e))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ConfigError::Read(path.to_string(), e))?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let params = &self.parameters;
        if params.slippage_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "slippage_bps must not exceed 10000, got {}",
                params.slippage_bps
            )));
        }
        let non_negative = [
            ("depeg_threshold", params.depeg_threshold),
            ("bridge_transfer_time_sec", params.bridge_transfer_time_sec),
            ("z_score", params.z_score),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(params.gwei_per_native.is_finite() && params.gwei_per_native > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "gwei_per_native must be positive, got {}",
                params.gwei_per_native
            )));
        }
        if self.model.command.is_empty() {
            return Err(ConfigError::Invalid("model.command must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Base URLs of every upstream service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub raydium_trade_api: String,
    pub raydium_pool_api: String,
    pub etherscan: String,
    pub ethereum_rpc: String,
    pub solana_rpc: String,
    pub coingecko: String,
    pub wormholescan: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            raydium_trade_api: "https://transaction-v1.raydium.io".to_string(),
            raydium_pool_api: "https://api-v3.raydium.io".to_string(),
            etherscan: "https://api.etherscan.io/v2/api".to_string(),
            ethereum_rpc: "https://ethereum-rpc.publicnode.com".to_string(),
            solana_rpc: "https://api.mainnet-beta.solana.com".to_string(),
            coingecko: "https://api.coingecko.com/api/v3".to_string(),
            wormholescan: "https://api.wormholescan.io/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub etherscan: Option<String>,
    pub coingecko: Option<String>,
}

impl ApiKeys {
    /// The configured Etherscan key, or the `ETHERSCAN_API_KEY` environment variable.
    pub fn etherscan_key(&self) -> Option<String> {
        self.etherscan
            .clone()
            .or_else(|| env::var(ETHERSCAN_API_KEY_ENV).ok())
    }
}

/// On-chain identifiers of the bridged token on both sides of the route.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Contracts {
    pub chain_id: u64,
    /// ERC-20 token on the source chain.
    pub token: String,
    pub token_bridge: String,
    pub token_decimals: u8,
    /// Wrapped token minted on the destination chain by the bridge.
    pub input_mint: String,
    /// Native stablecoin the wrapped token is swapped into.
    pub output_mint: String,
    pub input_decimals: u8,
    pub output_decimals: u8,
}

impl Default for Contracts {
    fn default() -> Self {
        Self {
            chain_id: 1,
            token: "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(),
            token_bridge: "0x3ee18B2214AFF97000D974cf647E7C347E8fa585".to_string(),
            token_decimals: 6,
            input_mint: "Dn4noZ5jgGfkntzcQSUZ8czkreiZ1ForXYoV2H8Dm7S1".to_string(),
            output_mint: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string(),
            input_decimals: 6,
            output_decimals: 6,
        }
    }
}

/// Cache lifetimes in seconds. Zero disables caching for that lookup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub spot_prices_secs: u64,
    pub reference_price_secs: u64,
    pub gas_price_secs: u64,
    pub gas_units_secs: u64,
    pub settlement_fee_secs: u64,
    pub block_time_secs: u64,
    pub volatility_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            spot_prices_secs: 10,
            reference_price_secs: 0,
            gas_price_secs: 30,
            gas_units_secs: 30,
            settlement_fee_secs: 30,
            block_time_secs: 30,
            volatility_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub http_secs: u64,
    pub bridge_health_secs: u64,
    pub model_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { http_secs: 10, bridge_health_secs: 5, model_secs: 30 }
    }
}

impl Timeouts {
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    pub fn bridge_health(&self) -> Duration {
        Duration::from_secs(self.bridge_health_secs)
    }

    pub fn model(&self) -> Duration {
        Duration::from_secs(self.model_secs)
    }
}

/// External volatility model invocation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Days of price history handed to the model.
    pub history_days: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["scripts/garch_vol.py".to_string()],
            history_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum age of the newest relayed message for the bridge to count as operational.
    pub freshness_secs: i64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { freshness_secs: 300 }
    }
}
