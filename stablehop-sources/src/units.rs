use serde::Deserialize;

/// Numeric field that upstream APIs send either as a JSON number or as a decimal string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Converts a decimal token amount into integer base units, rounding to the nearest unit.
pub(crate) fn to_base_units(amount: f64, decimals: u8) -> u128 {
    (amount * 10f64.powi(decimals as i32)).round() as u128
}

pub(crate) fn from_base_units(amount: f64, decimals: u8) -> f64 {
    amount / 10f64.powi(decimals as i32)
}
