//! Minimal JSON-RPC 2.0 client over HTTP for the Solana adapters.
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use stablehop_common::{QuoteError, SourceKind};
use tracing::{instrument, trace};

use crate::http::send_json;

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Clone)]
pub struct JsonRpcClient {
    http: Client,
    url: Url,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(http: Client, url: Url) -> Self {
        Self { http, url, next_id: Arc::new(AtomicU64::new(1)) }
    }

    /// Issues `method` with `params` and returns the decoded `result`.
    ///
    /// A JSON-RPC error object, a missing result and transport failures all surface as
    /// upstream errors attributed to `origin`.
    #[instrument(
        level = "trace",
        skip(self, params),
        fields(host = %self.url.host_str().unwrap_or_default())
    )]
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: P,
        origin: SourceKind,
    ) -> Result<R, QuoteError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self
            .next_id
            .fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest { jsonrpc: "2.0", id, method, params };
        trace!(id, method, "RpcRequest");

        let response: RpcResponse<R> = send_json(
            self.http
                .post(self.url.clone())
                .json(&body),
            origin,
        )
        .await?;

        if let Some(err) = response.error {
            let detail = err
                .data
                .map(|d| format!(" ({d})"))
                .unwrap_or_default();
            return Err(QuoteError::upstream(
                origin,
                format!("{method} failed with code {}: {}{detail}", err.code, err.message),
            ));
        }

        response
            .result
            .ok_or_else(|| QuoteError::upstream(origin, format!("{method} returned no result")))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;
    use crate::http::{build_client, DEFAULT_TIMEOUT};

    fn client(url: &str) -> JsonRpcClient {
        JsonRpcClient::new(build_client(DEFAULT_TIMEOUT).unwrap(), url.parse().unwrap())
    }

    #[tokio::test]
    async fn test_request_returns_result() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#""method"\s*:\s*"getSlot""#.to_string()))
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":250000000}"#)
            .expect(1)
            .create_async()
            .await;

        let slot: u64 = client(&server.url())
            .request("getSlot", json!([{"commitment": "confirmed"}]), SourceKind::SettlementFee)
            .await
            .unwrap();

        assert_eq!(slot, 250_000_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_error_object() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32002,"message":"Transaction simulation failed"}}"#,
            )
            .create_async()
            .await;

        let err = client(&server.url())
            .request::<_, u64>("getFeeForMessage", json!(["AQAB"]), SourceKind::SettlementFee)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            QuoteError::upstream(
                SourceKind::SettlementFee,
                "getFeeForMessage failed with code -32002: Transaction simulation failed"
            )
        );
    }

    #[tokio::test]
    async fn test_request_null_result() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":null}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .request::<_, u64>("getBlockTime", json!([1]), SourceKind::DestinationConfirmationTime)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            QuoteError::upstream(
                SourceKind::DestinationConfirmationTime,
                "getBlockTime returned no result"
            )
        );
    }
}
