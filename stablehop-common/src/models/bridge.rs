use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BridgeHealth {
    Operational,
    Degraded,
}

/// Operational status of the cross-chain message relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub status: BridgeHealth,
    pub message: String,
    pub last_checked: DateTime<Utc>,
    /// Timestamp of the most recent relayed message, when the feed returned one.
    pub last_activity: Option<DateTime<Utc>>,
}

impl BridgeStatus {
    pub const FALLBACK_MESSAGE: &'static str = "fallback: API unavailable";

    /// Conservative status reported when the relay feed cannot be reached.
    pub fn fallback(now: DateTime<Utc>) -> Self {
        Self {
            status: BridgeHealth::Operational,
            message: Self::FALLBACK_MESSAGE.to_string(),
            last_checked: now,
            last_activity: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.message == Self::FALLBACK_MESSAGE
    }
}
