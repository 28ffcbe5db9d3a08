use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Identifies the upstream a failure originated from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    SwapQuote,
    ReferencePrice,
    GasPrice,
    GasEstimate,
    SettlementFee,
    PriceOracle,
    PriceHistory,
    SourceConfirmationTime,
    DestinationConfirmationTime,
    BridgeHealth,
    Volatility,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    /// HTTP/RPC failure, timeout or a non-success status reported by a third party.
    #[error("{origin} upstream error: {message}")]
    Upstream { origin: SourceKind, message: String },

    /// The response parsed but violates a sanity bound.
    #[error("{origin} returned invalid data: {message}")]
    InvalidUpstreamData { origin: SourceKind, message: String },

    /// The external statistical model failed or produced unusable output.
    #[error("volatility model error: {0}")]
    Model(String),

    /// The caller supplied an invalid input amount.
    #[error("validation error: {0}")]
    Validation(String),
}

impl QuoteError {
    pub fn upstream<S: ToString>(origin: SourceKind, message: S) -> Self {
        Self::Upstream { origin, message: message.to_string() }
    }

    pub fn invalid_data<S: ToString>(origin: SourceKind, message: S) -> Self {
        Self::InvalidUpstreamData { origin, message: message.to_string() }
    }

    /// The source that caused the failure, if any.
    pub fn origin(&self) -> Option<SourceKind> {
        match self {
            Self::Upstream { origin, .. } | Self::InvalidUpstreamData { origin, .. } => {
                Some(*origin)
            }
            Self::Model(_) => Some(SourceKind::Volatility),
            Self::Validation(_) => None,
        }
    }

    /// Whether the boundary layer should report this as a client error rather than an
    /// upstream one.
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_source() {
        let err = QuoteError::upstream(SourceKind::GasPrice, "HTTP 502");
        assert_eq!(err.to_string(), "gas_price upstream error: HTTP 502");

        let err = QuoteError::invalid_data(SourceKind::PriceOracle, "price -1 for tether");
        assert_eq!(err.to_string(), "price_oracle returned invalid data: price -1 for tether");
    }

    #[test]
    fn test_origin_and_caller_fault() {
        assert_eq!(
            QuoteError::upstream(SourceKind::SwapQuote, "boom").origin(),
            Some(SourceKind::SwapQuote)
        );
        assert_eq!(QuoteError::Model("exit 1".into()).origin(), Some(SourceKind::Volatility));
        assert!(QuoteError::Validation("amount must be positive".into()).is_caller_fault());
        assert!(!QuoteError::Model("exit 1".into()).is_caller_fault());
    }
}
