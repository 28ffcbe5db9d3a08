//! Volatility estimates from CoinGecko price history and an external statistical model.
use std::{io::ErrorKind, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use stablehop_common::{
    models::Asset,
    traits::{VolatilityModel, VolatilitySource},
    QuoteError, SourceKind, TtlCache,
};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, instrument, trace};

use crate::coingecko::CoinGeckoClient;

const SECONDS_PER_DAY: f64 = 86_400.0;
pub const DEFAULT_HISTORY_DAYS: u32 = 30;
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct ModelOutput {
    volatility: f64,
}

/// Runs an external program that reads a JSON array of prices on stdin and answers with
/// `{"volatility": <daily estimate>}` on stdout.
#[derive(Debug, Clone)]
pub struct ProcessVolatilityModel {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessVolatilityModel {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }

    async fn run(&self, input: Vec<u8>) -> Result<std::process::Output, QuoteError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QuoteError::Model(format!("failed to spawn {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| QuoteError::Model("model stdin unavailable".to_string()))?;

        let exchange = async move {
            match stdin.write_all(&input).await {
                // child exited without reading, its status is checked below
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
                Ok(()) => {}
            }
            drop(stdin);
            child.wait_with_output().await
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| QuoteError::Model(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| QuoteError::Model(format!("failed to communicate with model: {e}")))
    }
}

#[async_trait]
impl VolatilityModel for ProcessVolatilityModel {
    #[instrument(skip_all, fields(program = %self.program, points = prices.len()))]
    async fn estimate_daily_volatility(&self, prices: &[f64]) -> Result<f64, QuoteError> {
        let input = serde_json::to_vec(prices)
            .map_err(|e| QuoteError::Model(format!("failed to encode prices: {e}")))?;
        let output = self.run(input).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QuoteError::Model(format!(
                "model exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(stdout = %stdout.trim(), "ModelOutput");
        let parsed: ModelOutput = serde_json::from_str(stdout.trim()).map_err(|e| {
            QuoteError::Model(format!("unparsable model output {:?}: {e}", stdout.trim()))
        })?;

        if !(parsed.volatility.is_finite() && parsed.volatility >= 0.0) {
            return Err(QuoteError::Model(format!(
                "model returned unusable volatility {}",
                parsed.volatility
            )));
        }
        Ok(parsed.volatility)
    }
}

/// Scales a one-day volatility to `time_horizon_sec` with the square-root-of-time rule.
pub fn scale_to_horizon(daily: f64, time_horizon_sec: f64) -> f64 {
    daily * (time_horizon_sec / SECONDS_PER_DAY).sqrt()
}

pub struct HistoricalVolatilitySource {
    prices: CoinGeckoClient,
    model: Arc<dyn VolatilityModel>,
    history_days: u32,
    cache: TtlCache<(Asset, u64), f64>,
}

impl HistoricalVolatilitySource {
    pub fn new(
        prices: CoinGeckoClient,
        model: Arc<dyn VolatilityModel>,
        history_days: u32,
        cache: TtlCache<(Asset, u64), f64>,
    ) -> Self {
        Self { prices, model, history_days, cache }
    }

    async fn estimate(&self, asset: Asset, time_horizon_sec: f64) -> Result<f64, QuoteError> {
        let history = self
            .prices
            .market_chart(asset, self.history_days)
            .await?;
        if history.len() < 2 {
            return Err(QuoteError::upstream(
                SourceKind::PriceHistory,
                format!(
                    "{} price points for {}, need at least 2",
                    history.len(),
                    asset.price_id()
                ),
            ));
        }

        let daily = self
            .model
            .estimate_daily_volatility(&history)
            .await?;
        let scaled = scale_to_horizon(daily, time_horizon_sec);
        debug!(%asset, daily, time_horizon_sec, scaled, "VolatilityEstimated");
        Ok(scaled)
    }
}

#[async_trait]
impl VolatilitySource for HistoricalVolatilitySource {
    #[instrument(skip(self))]
    async fn get_volatility(
        &self,
        asset: Asset,
        time_horizon_sec: f64,
    ) -> Result<f64, QuoteError> {
        if !(time_horizon_sec.is_finite() && time_horizon_sec >= 0.0) {
            return Err(QuoteError::invalid_data(
                SourceKind::Volatility,
                format!("time horizon {time_horizon_sec}s"),
            ));
        }
        let horizon_ms = (time_horizon_sec * 1000.0).round() as u64;
        self.cache
            .get_or_fetch((asset, horizon_ms), || self.estimate(asset, time_horizon_sec))
            .await
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;
    use mockito::{Matcher, Server, ServerGuard};
    use rstest::rstest;
    use stablehop_common::traits::MockVolatilityModel;

    use super::*;
    use crate::http::{build_client, parse_base_url, DEFAULT_TIMEOUT};

    fn shell_model(script: &str, timeout: Duration) -> ProcessVolatilityModel {
        ProcessVolatilityModel::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    fn source(
        server: &ServerGuard,
        model: MockVolatilityModel,
        ttl: Duration,
    ) -> HistoricalVolatilitySource {
        HistoricalVolatilitySource::new(
            CoinGeckoClient::new(
                build_client(DEFAULT_TIMEOUT).unwrap(),
                parse_base_url(&server.url()).unwrap(),
                None,
            ),
            Arc::new(model),
            DEFAULT_HISTORY_DAYS,
            TtlCache::new("volatility", ttl),
        )
    }

    async fn mock_history(server: &mut ServerGuard, body: &str, hits: usize) -> mockito::Mock {
        server
            .mock("GET", "/coins/usd-coin/market_chart")
            .match_query(Matcher::UrlEncoded("days".into(), "30".into()))
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    const HISTORY: &str = r#"{"prices":[[1,0.9999],[2,1.0002],[3,0.9997],[4,1.0001]]}"#;

    #[rstest]
    #[case::one_day(0.02, 86_400.0, 0.02)]
    #[case::four_days(0.02, 345_600.0, 0.04)]
    #[case::quarter_day(0.01, 21_600.0, 0.005)]
    #[case::instant(0.01, 0.0, 0.0)]
    fn test_scale_to_horizon(#[case] daily: f64, #[case] horizon: f64, #[case] expected: f64) {
        assert_float_eq!(scale_to_horizon(daily, horizon), expected, abs <= 1e-15);
    }

    #[tokio::test]
    async fn test_process_model_reads_stdin_and_parses_output() {
        let model = shell_model(
            r#"read prices; case "$prices" in \[*\]) echo '{"volatility": 0.0123}';; *) exit 3;; esac"#,
            DEFAULT_MODEL_TIMEOUT,
        );

        let vol = model
            .estimate_daily_volatility(&[1.0, 0.999, 1.001])
            .await
            .unwrap();

        assert_eq!(vol, 0.0123);
    }

    #[rstest]
    #[case::non_zero_exit("cat >/dev/null; echo 'no fit' >&2; exit 1", "model exited with")]
    #[case::garbage("cat >/dev/null; echo 'not json'", "unparsable model output")]
    #[case::negative(r#"cat >/dev/null; echo '{"volatility": -0.5}'"#, "unusable volatility -0.5")]
    #[case::wrong_shape(r#"cat >/dev/null; echo '{"sigma": 0.1}'"#, "unparsable model output")]
    #[tokio::test]
    async fn test_process_model_failures(#[case] script: &str, #[case] expected: &str) {
        let err = shell_model(script, DEFAULT_MODEL_TIMEOUT)
            .estimate_daily_volatility(&[1.0, 1.0])
            .await
            .unwrap_err();

        match err {
            QuoteError::Model(message) => assert!(message.contains(expected), "{message}"),
            other => panic!("expected model error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_process_model_timeout() {
        let err = shell_model("sleep 5", Duration::from_millis(200))
            .estimate_daily_volatility(&[1.0, 1.0])
            .await
            .unwrap_err();

        assert_eq!(err, QuoteError::Model("timed out after 200ms".to_string()));
    }

    #[tokio::test]
    async fn test_process_model_missing_program() {
        let model = ProcessVolatilityModel::new(
            "/nonexistent/garch-model",
            Vec::new(),
            DEFAULT_MODEL_TIMEOUT,
        );

        let err = model
            .estimate_daily_volatility(&[1.0, 1.0])
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::Model(ref m) if m.starts_with("failed to spawn")));
    }

    #[test_log::test(tokio::test)]
    async fn test_volatility_scaled_and_cached() {
        let mut server = Server::new_async().await;
        let history = mock_history(&mut server, HISTORY, 1).await;
        let mut model = MockVolatilityModel::new();
        model
            .expect_estimate_daily_volatility()
            .withf(|prices| prices.to_vec() == vec![0.9999, 1.0002, 0.9997, 1.0001])
            .times(1)
            .returning(|_| Ok(0.02));
        let source = source(&server, model, Duration::from_secs(300));

        for _ in 0..2 {
            let vol = source
                .get_volatility(Asset::Usdc, 345_600.0)
                .await
                .unwrap();
            assert_float_eq!(vol, 0.04, abs <= 1e-15);
        }
        history.assert_async().await;
    }

    #[tokio::test]
    async fn test_distinct_horizons_are_cached_separately() {
        let mut server = Server::new_async().await;
        let history = mock_history(&mut server, HISTORY, 2).await;
        let mut model = MockVolatilityModel::new();
        model
            .expect_estimate_daily_volatility()
            .times(2)
            .returning(|_| Ok(0.01));
        let source = source(&server, model, Duration::from_secs(300));

        source
            .get_volatility(Asset::Usdc, 1232.5)
            .await
            .unwrap();
        source
            .get_volatility(Asset::Usdc, 1232.6)
            .await
            .unwrap();

        history.assert_async().await;
    }

    #[tokio::test]
    async fn test_short_history() {
        let mut server = Server::new_async().await;
        let _history = mock_history(&mut server, r#"{"prices":[[1,1.0]]}"#, 1).await;
        let mut model = MockVolatilityModel::new();
        model
            .expect_estimate_daily_volatility()
            .never();

        let err = source(&server, model, Duration::from_secs(300))
            .get_volatility(Asset::Usdc, 1200.0)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            QuoteError::upstream(
                SourceKind::PriceHistory,
                "1 price points for usd-coin, need at least 2"
            )
        );
    }

    #[tokio::test]
    async fn test_model_failure_propagates_and_is_not_cached() {
        let mut server = Server::new_async().await;
        let history = mock_history(&mut server, HISTORY, 2).await;
        let mut model = MockVolatilityModel::new();
        model
            .expect_estimate_daily_volatility()
            .times(2)
            .returning(|_| Err(QuoteError::Model("did not converge".to_string())));
        let source = source(&server, model, Duration::from_secs(300));

        for _ in 0..2 {
            let err = source
                .get_volatility(Asset::Usdc, 1200.0)
                .await
                .unwrap_err();
            assert_eq!(err, QuoteError::Model("did not converge".to_string()));
        }
        history.assert_async().await;
    }
}
