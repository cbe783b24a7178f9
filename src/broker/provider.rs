/// Market data collaborator interface consumed by the scan core
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Candle, Instrument, Quote, Timeframe};

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Option contracts listed on an exchange segment, e.g. "NFO"
    async fn list_instruments(&self, exchange_segment: &str) -> Result<Vec<Instrument>>;

    /// OHLCV candles ascending by time
    async fn historical_candles(
        &self,
        token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>>;

    /// Quotes keyed by the requested symbol. May return a subset.
    async fn batched_quote(&self, symbols: &[String]) -> Result<HashMap<String, Quote>>;
}
