/// In-memory provider for unit tests
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::broker::MarketDataProvider;
use crate::error::{Result, ScanError};
use crate::types::{Candle, Instrument, OptionType, Quote, Timeframe};

pub(crate) fn base_expiry() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
}

/// NFO contract expiring `days` after 2025-01-02
pub(crate) fn option(name: &str, side: OptionType, strike: f64, days: i64) -> Instrument {
    let expiry = base_expiry() + chrono::Duration::days(days);
    Instrument {
        instrument_token: format!("{}{}{}{}", name, expiry.format("%y%m%d"), strike as i64, side.as_str()),
        exchange: "NFO".to_string(),
        tradingsymbol: format!("{}{}{}{}", name, expiry.format("%y%m%d"), strike as i64, side.as_str()),
        name: name.to_string(),
        option_type: side,
        strike,
        expiry,
        lot_size: 25,
        tick_size: 0.05,
    }
}

pub(crate) fn quote(ltp: f64, volume: u64) -> Quote {
    Quote {
        last_price: Some(ltp),
        volume: Some(volume),
        best_bid: Some(ltp - 0.5),
        best_ask: Some(ltp + 0.5),
    }
}

#[derive(Default)]
pub(crate) struct MockProvider {
    instruments: Vec<Instrument>,
    candles: HashMap<(String, Timeframe), Vec<Candle>>,
    quotes: HashMap<String, Quote>,
    /// Reject any quote request with more symbols than this
    max_batch: Option<usize>,
    failing_instruments: bool,
    instrument_calls: AtomicUsize,
    quote_batches: Mutex<Vec<usize>>,
}

impl MockProvider {
    pub(crate) fn new(instruments: Vec<Instrument>) -> Self {
        MockProvider {
            instruments,
            ..Default::default()
        }
    }

    pub(crate) fn failing_instruments(mut self) -> Self {
        self.failing_instruments = true;
        self
    }

    pub(crate) fn with_max_batch(mut self, max: usize) -> Self {
        self.max_batch = Some(max);
        self
    }

    pub(crate) fn with_quote(mut self, symbol: &str, quote: Quote) -> Self {
        self.quotes.insert(symbol.to_string(), quote);
        self
    }

    pub(crate) fn with_candles(mut self, token: &str, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.candles.insert((token.to_string(), timeframe), candles);
        self
    }

    pub(crate) fn instrument_calls(&self) -> usize {
        self.instrument_calls.load(Ordering::SeqCst)
    }

    /// Sizes of every quote request seen so far
    pub(crate) fn quote_batches(&self) -> Vec<usize> {
        self.quote_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn list_instruments(&self, _exchange_segment: &str) -> Result<Vec<Instrument>> {
        self.instrument_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_instruments {
            return Err(ScanError::NetworkTimeout("instrument dump".to_string()));
        }
        Ok(self.instruments.clone())
    }

    async fn historical_candles(
        &self,
        token: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>> {
        Ok(self
            .candles
            .get(&(token.to_string(), timeframe))
            .cloned()
            .unwrap_or_default())
    }

    async fn batched_quote(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        self.quote_batches.lock().unwrap().push(symbols.len());
        if let Some(max) = self.max_batch {
            if symbols.len() > max {
                return Err(ScanError::BrokerApiError {
                    code: "400".to_string(),
                    message: format!("too many instruments: {}", symbols.len()),
                });
            }
        }
        Ok(symbols
            .iter()
            .filter_map(|s| self.quotes.get(s).map(|q| (s.clone(), q.clone())))
            .collect())
    }
}
