//! Cross-chain stablecoin transfer quotes.
//!
//! [`QuoteAggregator`] queries every upstream source concurrently and folds their answers into
//! one [`Quote`](stablehop_common::models::Quote) covering output amount, fees, timing and risk.
//! [`QuoterBuilder`] wires the production adapters from a YAML [`QuoterConfig`].
#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod aggregator;
pub mod builder;
pub mod cli;
pub mod config;

pub use aggregator::{QuoteAggregator, QuoteParameters, QuoteSources};
pub use builder::QuoterBuilder;
pub use config::{ConfigError, QuoterConfig};
