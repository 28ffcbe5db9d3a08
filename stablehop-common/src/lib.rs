pub mod cache;
pub mod errors;
pub mod models;
pub mod traits;

pub use cache::TtlCache;
pub use errors::{QuoteError, SourceKind};
