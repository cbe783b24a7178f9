pub mod instrument_cache;
pub mod kite;
pub mod provider;
pub mod quote_batcher;

#[cfg(test)]
pub(crate) mod testing;

pub use instrument_cache::InstrumentCache;
pub use kite::KiteClient;
pub use provider::MarketDataProvider;
pub use quote_batcher::{fetch_quotes, QuoteBatchPolicy, QuoteFetch};
