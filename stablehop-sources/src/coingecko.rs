//! CoinGecko spot prices and price history.
use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use stablehop_common::{models::Asset, traits::PriceOracle, QuoteError, SourceKind, TtlCache};
use tracing::{debug, instrument};

use crate::http::{endpoint, send_json};

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

#[derive(Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base: Url,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(http: Client, base: Url, api_key: Option<String>) -> Self {
        Self { http, base, api_key }
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// USD spot price of `asset`.
    pub async fn simple_price(&self, asset: Asset) -> Result<f64, QuoteError> {
        let origin = SourceKind::PriceOracle;
        let id = asset.price_id();
        let mut url = endpoint(&self.base, "simple/price", origin)?;
        url.query_pairs_mut()
            .append_pair("ids", id)
            .append_pair("vs_currencies", "usd");

        let prices: HashMap<String, HashMap<String, f64>> =
            send_json(self.get(url), origin).await?;
        prices
            .get(id)
            .and_then(|quotes| quotes.get("usd"))
            .copied()
            .ok_or_else(|| QuoteError::upstream(origin, format!("no usd price for {id}")))
    }

    /// USD price points of `asset` over the last `days` days, oldest first.
    pub async fn market_chart(&self, asset: Asset, days: u32) -> Result<Vec<f64>, QuoteError> {
        let origin = SourceKind::PriceHistory;
        let path = format!("coins/{}/market_chart", asset.price_id());
        let mut url = endpoint(&self.base, &path, origin)?;
        url.query_pairs_mut()
            .append_pair("vs_currency", "usd")
            .append_pair("days", &days.to_string());

        let chart: MarketChart = send_json(self.get(url), origin).await?;
        Ok(chart
            .prices
            .into_iter()
            .map(|(_, price)| price)
            .collect())
    }
}

/// Spot prices with one cache entry per asset.
pub struct CoinGeckoPriceOracle {
    client: CoinGeckoClient,
    cache: TtlCache<Asset, f64>,
}

impl CoinGeckoPriceOracle {
    pub fn new(client: CoinGeckoClient, cache: TtlCache<Asset, f64>) -> Self {
        Self { client, cache }
    }

    async fn fetch_price(&self, asset: Asset) -> Result<f64, QuoteError> {
        let price = self.client.simple_price(asset).await?;
        if !(price.is_finite() && price > 0.0) {
            return Err(QuoteError::invalid_data(
                SourceKind::PriceOracle,
                format!("price {price} for {}", asset.price_id()),
            ));
        }
        debug!(%asset, price, "SpotPriceFetched");
        Ok(price)
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoPriceOracle {
    #[instrument(skip(self))]
    async fn get_price(&self, asset: Asset) -> Result<f64, QuoteError> {
        self.cache
            .get_or_fetch(asset, || self.fetch_price(asset))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server, ServerGuard};
    use stablehop_common::models::DepegRisk;

    use super::*;
    use crate::http::{build_client, parse_base_url, DEFAULT_TIMEOUT};

    fn client(server: &ServerGuard, api_key: Option<&str>) -> CoinGeckoClient {
        CoinGeckoClient::new(
            build_client(DEFAULT_TIMEOUT).unwrap(),
            parse_base_url(&format!("{}/api/v3", server.url())).unwrap(),
            api_key.map(str::to_string),
        )
    }

    fn oracle(server: &ServerGuard) -> CoinGeckoPriceOracle {
        CoinGeckoPriceOracle::new(
            client(server, None),
            TtlCache::new("spot_prices", Duration::from_secs(10)),
        )
    }

    async fn mock_price(server: &mut ServerGuard, id: &str, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ids".into(), id.into()),
                Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
            ]))
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    #[test_log::test(tokio::test)]
    async fn test_prices_cached_per_asset() {
        let mut server = Server::new_async().await;
        let eth = mock_price(&mut server, "ethereum", r#"{"ethereum":{"usd":3120.55}}"#).await;
        let sol = mock_price(&mut server, "solana", r#"{"solana":{"usd":145.2}}"#).await;
        let oracle = oracle(&server);

        for _ in 0..2 {
            assert_eq!(
                oracle
                    .get_price(Asset::Eth)
                    .await
                    .unwrap(),
                3120.55
            );
            assert_eq!(
                oracle
                    .get_price(Asset::Sol)
                    .await
                    .unwrap(),
                145.2
            );
        }
        eth.assert_async().await;
        sol.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_price_field() {
        let mut server = Server::new_async().await;
        let _mock = mock_price(&mut server, "tether", r#"{}"#).await;

        let err = oracle(&server)
            .get_price(Asset::Usdt)
            .await
            .unwrap_err();

        assert_eq!(err, QuoteError::upstream(SourceKind::PriceOracle, "no usd price for tether"));
    }

    #[tokio::test]
    async fn test_non_positive_price() {
        let mut server = Server::new_async().await;
        let _mock = mock_price(&mut server, "usd-coin", r#"{"usd-coin":{"usd":0}}"#).await;

        let err = oracle(&server)
            .get_price(Asset::Usdc)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            QuoteError::invalid_data(SourceKind::PriceOracle, "price 0 for usd-coin")
        );
    }

    #[tokio::test]
    async fn test_depeg_risk_reuses_cached_price() {
        let mut server = Server::new_async().await;
        let mock = mock_price(&mut server, "tether", r#"{"tether":{"usd":1.006}}"#).await;
        let oracle = oracle(&server);

        oracle
            .get_price(Asset::Usdt)
            .await
            .unwrap();
        let risk = oracle
            .get_depeg_risk(Asset::Usdt, DepegRisk::DEFAULT_THRESHOLD)
            .await
            .unwrap();

        assert!(risk.is_at_risk);
        assert_eq!(risk.oracle_price, 1.006);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_market_chart_sends_api_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/coins/usd-coin/market_chart")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("vs_currency".into(), "usd".into()),
                Matcher::UrlEncoded("days".into(), "30".into()),
            ]))
            .match_header(API_KEY_HEADER, "demo-key")
            .with_body(
                r#"{"prices":[[1717200000000,0.9998],[1717286400000,1.0001],[1717372800000,0.9999]],"market_caps":[],"total_volumes":[]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let prices = client(&server, Some("demo-key"))
            .market_chart(Asset::Usdc, 30)
            .await
            .unwrap();

        assert_eq!(prices, vec![0.9998, 1.0001, 0.9999]);
        mock.assert_async().await;
    }
}
