//! Etherscan gas tracker client.
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use stablehop_common::{QuoteError, SourceKind};
use tracing::{instrument, trace};

use crate::{http::get_json, units::Numeric};

const PLACEHOLDER_KEY: &str = "YourApiKeyToken";

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct RawGasOracle {
    #[serde(rename = "SafeGasPrice")]
    safe: Option<Numeric>,
    #[serde(rename = "ProposeGasPrice")]
    propose: Option<Numeric>,
    #[serde(rename = "FastGasPrice")]
    fast: Option<Numeric>,
}

/// Gas price tiers in gwei. Tiers the API omitted or sent garbled are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GasOracle {
    pub safe: Option<f64>,
    pub propose: Option<f64>,
    pub fast: Option<f64>,
}

impl GasOracle {
    /// The propose tier, falling back to fast and then safe when a tier is missing or zero.
    pub fn preferred(&self) -> Option<f64> {
        [self.propose, self.fast, self.safe]
            .into_iter()
            .flatten()
            .find(|price| *price != 0.0)
    }
}

#[derive(Clone)]
pub struct EtherscanClient {
    http: Client,
    base: Url,
    api_key: Option<String>,
    chain_id: u64,
}

impl EtherscanClient {
    pub fn new(http: Client, base: Url, api_key: Option<String>, chain_id: u64) -> Self {
        Self { http, base, api_key, chain_id }
    }

    async fn gastracker(
        &self,
        action: &str,
        extra: &[(&str, String)],
        origin: SourceKind,
    ) -> Result<Value, QuoteError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_KEY)
            .ok_or_else(|| QuoteError::upstream(origin, "Etherscan API key not configured"))?;

        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("chainid", &self.chain_id.to_string())
                .append_pair("module", "gastracker")
                .append_pair("action", action);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
            query.append_pair("apikey", api_key);
        }

        let response: EtherscanResponse = get_json(&self.http, url, origin).await?;
        trace!(action, status = %response.status, message = %response.message, "EtherscanResponse");
        if response.status != "1" {
            let detail = match &response.result {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(QuoteError::upstream(
                origin,
                format!("Etherscan API error: {} - {detail}", response.message),
            ));
        }
        Ok(response.result)
    }

    #[instrument(skip(self))]
    pub async fn gas_oracle(&self) -> Result<GasOracle, QuoteError> {
        let origin = SourceKind::GasPrice;
        let result = self
            .gastracker("gasoracle", &[], origin)
            .await?;
        let raw: RawGasOracle = serde_json::from_value(result)
            .map_err(|e| QuoteError::upstream(origin, format!("malformed gas oracle: {e}")))?;
        let tier = |n: Option<Numeric>| n.and_then(|n| n.as_f64());
        Ok(GasOracle { safe: tier(raw.safe), propose: tier(raw.propose), fast: tier(raw.fast) })
    }

    /// Expected seconds until a transaction paying `gas_price_wei` confirms.
    #[instrument(skip(self))]
    pub async fn gas_estimate(&self, gas_price_wei: u128) -> Result<f64, QuoteError> {
        let origin = SourceKind::SourceConfirmationTime;
        let result = self
            .gastracker("gasestimate", &[("gasprice", gas_price_wei.to_string())], origin)
            .await?;
        serde_json::from_value::<Numeric>(result.clone())
            .ok()
            .and_then(|n| n.as_f64())
            .filter(|secs| secs.is_finite())
            .ok_or_else(|| QuoteError::upstream(origin, format!("non-numeric estimate {result}")))
    }
}
