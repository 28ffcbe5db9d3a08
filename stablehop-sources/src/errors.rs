use thiserror::Error;

/// Failures while constructing a source adapter.
#[derive(Error, Debug)]
pub enum SetupError {
    /// A configured base URL failed to parse.
    #[error("Failed to parse URL: {0}. Error: {1}")]
    UrlParsing(String, String),

    /// A configured contract address is not a 20 byte hex string.
    #[error("Invalid address {0}: {1}")]
    InvalidAddress(String, String),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
