//! HTTP plumbing shared by the REST adapters.
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Url};
use serde::de::DeserializeOwned;
use stablehop_common::{QuoteError, SourceKind};
use tracing::trace;

use crate::errors::SetupError;

/// Default per-request timeout for upstream calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds an HTTP client whose requests fail after `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client, SetupError> {
    let user_agent = format!("stablehop/{version}", version = env!("CARGO_PKG_VERSION"));
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .user_agent(user_agent)
        .build()
        .map_err(SetupError::HttpClient)
}

pub fn parse_base_url(raw: &str) -> Result<Url, SetupError> {
    raw.parse::<Url>()
        .map_err(|e| SetupError::UrlParsing(raw.to_string(), e.to_string()))
}

/// Appends `path` to `base`, keeping any path the base already carries.
pub(crate) fn endpoint(base: &Url, path: &str, origin: SourceKind) -> Result<Url, QuoteError> {
    if path.is_empty() {
        return Ok(base.clone());
    }
    let joined =
        format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&joined)
        .map_err(|e| QuoteError::upstream(origin, format!("invalid endpoint {joined}: {e}")))
}

pub(crate) fn request_error(origin: SourceKind, context: &str, e: reqwest::Error) -> QuoteError {
    if e.is_timeout() {
        QuoteError::upstream(origin, format!("{context}: request timed out"))
    } else {
        QuoteError::upstream(origin, format!("{context}: {e}"))
    }
}

/// Sends `request` and deserializes a successful JSON body.
///
/// Transport failures, timeouts, non-2xx statuses and bodies that do not match `T` are all
/// reported as upstream errors of `origin`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    origin: SourceKind,
) -> Result<T, QuoteError> {
    let response = request
        .send()
        .await
        .map_err(|e| request_error(origin, "request failed", e))?;

    let status = response.status();
    trace!(%origin, url = response.url().path(), %status, "UpstreamResponse");
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_default();
        return Err(QuoteError::upstream(origin, format!("HTTP {status}: {}", snippet(&body))));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| request_error(origin, "failed to parse response", e))
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
    origin: SourceKind,
) -> Result<T, QuoteError> {
    send_json(client.get(url), origin).await
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
