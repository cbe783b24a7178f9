/// Kite Connect REST client implementing the market data provider
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Kolkata;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::broker::MarketDataProvider;
use crate::error::{Result, ScanError};
use crate::types::{Candle, Instrument, KiteConfig, OptionType, Quote, Timeframe};
use crate::utils::RateLimiter;

const KITE_VERSION: &str = "3";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug, Deserialize)]
struct KiteEnvelope<T> {
    status: String,
    data: Option<T>,
    message: Option<String>,
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandleData {
    candles: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct DepthLevel {
    price: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Depth {
    #[serde(default)]
    buy: Vec<DepthLevel>,
    #[serde(default)]
    sell: Vec<DepthLevel>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    last_price: Option<f64>,
    volume: Option<u64>,
    depth: Option<Depth>,
}

/// One row of the instrument dump CSV
#[derive(Debug, Deserialize)]
struct RawInstrument {
    instrument_token: String,
    tradingsymbol: String,
    name: String,
    expiry: String,
    strike: String,
    tick_size: String,
    lot_size: String,
    instrument_type: String,
    exchange: String,
}

/// Kite Connect client
pub struct KiteClient {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: String,
    quote_limiter: RateLimiter,
    historical_limiter: RateLimiter,
}

impl KiteClient {
    pub fn new(config: &KiteConfig) -> Result<Self> {
        if config.api_key.is_empty() || config.access_token.is_empty() {
            return Err(ScanError::ConfigError(
                "kite.api_key and kite.access_token are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(KiteClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            quote_limiter: RateLimiter::per_second(config.quote_requests_per_sec),
            historical_limiter: RateLimiter::per_second(config.historical_requests_per_sec),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Kite-Version", KITE_VERSION)
            .header(
                "Authorization",
                format!("token {}:{}", self.api_key, self.access_token),
            )
    }

    /// Send a request and return the body, mapping HTTP failures to scan errors
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<String> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ScanError::NetworkTimeout(format!("{}: {}", what, e))
            } else {
                ScanError::HttpError(e)
            }
        })?;

        let status = response.status();
        let body = response.text().await?;
        debug!("{} response status: {}", what, status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScanError::RateLimitExceeded(what.to_string()));
        }
        if !status.is_success() {
            let message = serde_json::from_str::<KiteEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|env| env.message)
                .unwrap_or(body);
            return Err(ScanError::BrokerApiError {
                code: status.as_u16().to_string(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl MarketDataProvider for KiteClient {
    async fn list_instruments(&self, exchange_segment: &str) -> Result<Vec<Instrument>> {
        let body = self
            .send(self.get(&format!("/instruments/{}", exchange_segment)), "instruments")
            .await?;
        parse_instruments_csv(&body)
    }

    async fn historical_candles(
        &self,
        token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>> {
        self.historical_limiter.acquire().await;

        let fmt = |t: DateTime<Utc>| t.with_timezone(&Kolkata).format("%Y-%m-%d %H:%M:%S").to_string();
        let request = self
            .get(&format!("/instruments/historical/{}/{}", token, timeframe.as_str()))
            .query(&[("from", fmt(from)), ("to", fmt(to))]);

        let body = self.send(request, "historical").await?;
        let candles = parse_candles(&body)?;
        debug!("Fetched {} {} candles for {}", candles.len(), timeframe.as_str(), token);
        Ok(candles)
    }

    async fn batched_quote(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        self.quote_limiter.acquire().await;

        let params: Vec<(&str, &str)> = symbols.iter().map(|s| ("i", s.as_str())).collect();
        let body = self.send(self.get("/quote").query(&params), "quote").await?;
        parse_quotes(&body)
    }
}

fn unwrap_envelope<T>(envelope: KiteEnvelope<T>, what: &str) -> Result<T> {
    if envelope.status != "success" {
        return Err(ScanError::BrokerApiError {
            code: envelope.error_type.unwrap_or_else(|| "error".to_string()),
            message: envelope
                .message
                .unwrap_or_else(|| format!("{} request failed", what)),
        });
    }
    envelope
        .data
        .ok_or_else(|| ScanError::MissingData(format!("{} response has no data", what)))
}

/// Parse the instrument dump, keeping CE/PE contracts with a valid expiry
pub(crate) fn parse_instruments_csv(body: &str) -> Result<Vec<Instrument>> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut instruments = Vec::new();
    let mut skipped = 0usize;

    for row in reader.deserialize::<RawInstrument>() {
        let Ok(raw) = row else {
            skipped += 1;
            continue;
        };
        let Some(option_type) = OptionType::from_str(&raw.instrument_type) else {
            continue;
        };

        let parsed = to_instrument(raw, option_type);

        match parsed {
            Some(instrument) => instruments.push(instrument),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("⚠️ Skipped {} malformed rows in instrument dump", skipped);
    }
    Ok(instruments)
}

fn to_instrument(raw: RawInstrument, option_type: OptionType) -> Option<Instrument> {
    Some(Instrument {
        strike: raw.strike.parse().ok()?,
        expiry: NaiveDate::parse_from_str(&raw.expiry, "%Y-%m-%d").ok()?,
        lot_size: raw.lot_size.parse().ok()?,
        tick_size: raw.tick_size.parse().unwrap_or(0.05),
        instrument_token: raw.instrument_token,
        exchange: raw.exchange,
        tradingsymbol: raw.tradingsymbol,
        name: raw.name,
        option_type,
    })
}

/// Parse `[timestamp, open, high, low, close, volume, ...]` rows, sorted ascending
pub(crate) fn parse_candles(body: &str) -> Result<Vec<Candle>> {
    let envelope: KiteEnvelope<CandleData> = serde_json::from_str(body)?;
    let data = unwrap_envelope(envelope, "historical")?;

    let mut candles = data
        .candles
        .iter()
        .map(|row| parse_candle_row(row))
        .collect::<Result<Vec<_>>>()?;
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

fn parse_candle_row(row: &[serde_json::Value]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(ScanError::InvalidCandleData(format!(
            "expected 6 fields, got {}",
            row.len()
        )));
    }

    let ts = row[0]
        .as_str()
        .ok_or_else(|| ScanError::InvalidCandleData("timestamp is not a string".to_string()))?;
    let timestamp = DateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
        .map_err(|e| ScanError::InvalidCandleData(format!("{}: {}", ts, e)))?
        .with_timezone(&Utc);

    let num = |i: usize| {
        row[i]
            .as_f64()
            .ok_or_else(|| ScanError::InvalidCandleData(format!("field {} is not numeric at {}", i, ts)))
    };

    Ok(Candle {
        timestamp,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?.max(0.0) as u64,
    })
}

/// Parse a quote response. Zero prices mean "not traded" and map to None.
pub(crate) fn parse_quotes(body: &str) -> Result<HashMap<String, Quote>> {
    let envelope: KiteEnvelope<HashMap<String, RawQuote>> = serde_json::from_str(body)?;
    let data = unwrap_envelope(envelope, "quote")?;

    let positive = |p: f64| if p > 0.0 { Some(p) } else { None };

    Ok(data
        .into_iter()
        .map(|(symbol, raw)| {
            let depth = raw.depth.unwrap_or_default();
            let quote = Quote {
                last_price: raw.last_price.and_then(positive),
                volume: raw.volume,
                best_bid: depth.buy.first().and_then(|l| positive(l.price)),
                best_ask: depth.sell.first().and_then(|l| positive(l.price)),
            };
            (symbol, quote)
        })
        .collect())
}
