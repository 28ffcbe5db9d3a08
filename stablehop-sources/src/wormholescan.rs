//! Bridge health derived from the Wormholescan VAA feed.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use stablehop_common::{
    models::{BridgeHealth, BridgeStatus},
    traits::BridgeHealthSource,
    QuoteError, SourceKind,
};
use tracing::{debug, instrument, warn};

use crate::http::{endpoint, get_json};

/// Relay activity older than this many seconds marks the bridge as degraded.
pub const DEFAULT_FRESHNESS_SECS: i64 = 300;

#[derive(Deserialize)]
struct VaaPage {
    #[serde(default)]
    data: Vec<Vaa>,
}

#[derive(Deserialize)]
struct Vaa {
    timestamp: DateTime<Utc>,
}

/// Classifies the relay from the timestamp of its most recent VAA.
pub fn status_from_feed(
    latest: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    freshness: Duration,
) -> BridgeStatus {
    match latest {
        Some(ts) => {
            let status = if now - ts < freshness {
                BridgeHealth::Operational
            } else {
                BridgeHealth::Degraded
            };
            BridgeStatus {
                status,
                message: format!("last VAA: {}", ts.to_rfc3339()),
                last_checked: now,
                last_activity: Some(ts),
            }
        }
        None => BridgeStatus {
            status: BridgeHealth::Degraded,
            message: "no recent activity".to_string(),
            last_checked: now,
            last_activity: None,
        },
    }
}

pub struct WormholescanBridgeHealth {
    http: Client,
    base: Url,
    freshness: Duration,
}

impl WormholescanBridgeHealth {
    /// `http` should carry a short timeout, a slow feed must not hold up the quote.
    pub fn new(http: Client, base: Url, freshness: Duration) -> Self {
        Self { http, base, freshness }
    }

    async fn latest_vaa(&self) -> Result<Option<DateTime<Utc>>, QuoteError> {
        let origin = SourceKind::BridgeHealth;
        let mut url = endpoint(&self.base, "vaas/", origin)?;
        url.query_pairs_mut()
            .append_pair("page", "0")
            .append_pair("pageSize", "5")
            .append_pair("sortOrder", "DESC");

        let page: VaaPage = get_json(&self.http, url, origin).await?;
        Ok(page
            .data
            .first()
            .map(|vaa| vaa.timestamp))
    }
}

#[async_trait]
impl BridgeHealthSource for WormholescanBridgeHealth {
    #[instrument(skip(self))]
    async fn get_bridge_status(&self) -> BridgeStatus {
        let now = Utc::now();
        match self.latest_vaa().await {
            Ok(latest) => {
                let status = status_from_feed(latest, now, self.freshness);
                debug!(status = %status.status, "BridgeStatusFetched");
                status
            }
            Err(err) => {
                warn!(error = %err, "Bridge feed unavailable, assuming operational");
                BridgeStatus::fallback(now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server, ServerGuard};
    use rstest::rstest;

    use super::*;
    use crate::http::{build_client, parse_base_url};

    fn freshness() -> Duration {
        Duration::seconds(DEFAULT_FRESHNESS_SECS)
    }

    fn health(url: &str) -> WormholescanBridgeHealth {
        WormholescanBridgeHealth::new(
            build_client(std::time::Duration::from_millis(500)).unwrap(),
            parse_base_url(url).unwrap(),
            freshness(),
        )
    }

    async fn mock_feed(server: &mut ServerGuard, status: usize, body: String) -> mockito::Mock {
        server
            .mock("GET", "/api/v1/vaas/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "0".into()),
                Matcher::UrlEncoded("pageSize".into(), "5".into()),
                Matcher::UrlEncoded("sortOrder".into(), "DESC".into()),
            ]))
            .with_status(status)
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    #[rstest]
    #[case::fresh(60, BridgeHealth::Operational)]
    #[case::just_stale(300, BridgeHealth::Degraded)]
    #[case::stale(3600, BridgeHealth::Degraded)]
    #[case::clock_skew(-30, BridgeHealth::Operational)]
    fn test_status_from_feed(#[case] age_secs: i64, #[case] expected: BridgeHealth) {
        let now = Utc::now();
        let latest = now - Duration::seconds(age_secs);

        let status = status_from_feed(Some(latest), now, freshness());

        assert_eq!(status.status, expected);
        assert_eq!(status.last_activity, Some(latest));
        assert_eq!(status.message, format!("last VAA: {}", latest.to_rfc3339()));
    }

    #[test]
    fn test_empty_feed_is_degraded() {
        let now = Utc::now();
        let status = status_from_feed(None, now, freshness());

        assert_eq!(
            status,
            BridgeStatus {
                status: BridgeHealth::Degraded,
                message: "no recent activity".to_string(),
                last_checked: now,
                last_activity: None,
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_recent_vaa_is_operational() {
        let mut server = Server::new_async().await;
        let recent = (Utc::now() - Duration::seconds(20)).to_rfc3339();
        let mock = mock_feed(
            &mut server,
            200,
            format!(
                r#"{{"data":[{{"id":"2/0000000000000000000000003ee18b2214aff97000d974cf647e7c347e8fa585/1","sequence":1,"emitterChain":2,"timestamp":"{recent}"}}],"pagination":{{"next":""}}}}"#
            ),
        )
        .await;

        let status = health(&format!("{}/api/v1", server.url()))
            .get_bridge_status()
            .await;

        assert_eq!(status.status, BridgeHealth::Operational);
        assert!(!status.is_fallback());
        mock.assert_async().await;
    }

    #[rstest]
    #[case::server_error(500, "internal error")]
    #[case::unparsable(200, "<html>maintenance</html>")]
    #[tokio::test]
    async fn test_feed_failure_falls_back(#[case] status: usize, #[case] body: &str) {
        let mut server = Server::new_async().await;
        let _mock = mock_feed(&mut server, status, body.to_string()).await;

        let status = health(&format!("{}/api/v1", server.url()))
            .get_bridge_status()
            .await;

        assert_eq!(status.status, BridgeHealth::Operational);
        assert!(status.is_fallback());
        assert_eq!(status.last_activity, None);
    }

    #[tokio::test]
    async fn test_feed_timeout_falls_back() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let status = health(&format!("http://{addr}/api/v1"))
            .get_bridge_status()
            .await;

        assert!(status.is_fallback());
    }
}
