/// Core type definitions for the option scanner
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle data structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Option type (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    CE, // Call European
    PE, // Put European
}

impl OptionType {
    pub fn as_str(&self) -> &str {
        match self {
            OptionType::CE => "CE",
            OptionType::PE => "PE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CE" => Some(OptionType::CE),
            "PE" => Some(OptionType::PE),
            _ => None,
        }
    }
}

/// Listed option contract from the instrument master
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: String,
    pub exchange: String,
    pub tradingsymbol: String,
    /// Underlying name, e.g. "NIFTY"
    pub name: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub lot_size: u32,
    pub tick_size: f64,
}

impl Instrument {
    /// Key used by the quote endpoint, e.g. "NFO:NIFTY24OCT25000CE"
    pub fn quote_key(&self) -> String {
        format!("{}:{}", self.exchange, self.tradingsymbol)
    }
}

/// Point-in-time quote snapshot. Absent fields are unknown, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub last_price: Option<f64>,
    pub volume: Option<u64>,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
}

impl Quote {
    /// Bid/ask spread when both sides of the book are present and sane
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask >= bid => Some(ask - bid),
            _ => None,
        }
    }
}

/// Candle granularity understood by the market data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "minute")]
    OneMinute,
    #[serde(rename = "5minute")]
    FiveMinute,
    #[serde(rename = "15minute")]
    FifteenMinute,
    #[serde(rename = "60minute")]
    Hourly,
    #[serde(rename = "day")]
    Daily,
}

impl Timeframe {
    pub fn as_str(&self) -> &str {
        match self {
            Timeframe::OneMinute => "minute",
            Timeframe::FiveMinute => "5minute",
            Timeframe::FifteenMinute => "15minute",
            Timeframe::Hourly => "60minute",
            Timeframe::Daily => "day",
        }
    }
}

/// Whether a pick buys or sells the option premium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Long,
    Short,
}

impl TradeType {
    pub fn as_str(&self) -> &str {
        match self {
            TradeType::Long => "LONG",
            TradeType::Short => "SHORT",
        }
    }

    pub fn entry_action(&self) -> Side {
        match self {
            TradeType::Long => Side::Buy,
            TradeType::Short => Side::Sell,
        }
    }
}

/// Trade side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// One underlying to scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingSpec {
    pub name: String,
    /// Instrument token used for historical candles
    pub spot_token: String,
    /// Quote key for the spot/index, e.g. "NSE:NIFTY 50"
    pub spot_symbol: String,
}

/// Configuration for the scanner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_exchange_segment")]
    pub exchange_segment: String,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub dividend_yield: f64,
    #[serde(default = "default_budget")]
    pub default_budget: f64,
    #[serde(default = "default_max_picks")]
    pub max_picks: usize,
    /// Fallback tick when an instrument carries none
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,

    pub underlyings: Vec<UnderlyingSpec>,

    #[serde(default)]
    pub bias: BiasConfig,
    #[serde(default)]
    pub zones: ZoneConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub gates: GateConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub exits: ExitPolicy,
    #[serde(default)]
    pub quotes: QuoteBatchConfig,
    #[serde(default)]
    pub kite: KiteConfig,
}

fn default_exchange_segment() -> String {
    "NFO".to_string()
}

fn default_risk_free_rate() -> f64 {
    0.065
}

fn default_budget() -> f64 {
    10_000.0
}

fn default_max_picks() -> usize {
    10
}

fn default_tick_size() -> f64 {
    0.05
}

impl Config {
    /// Config with defaults for every section and the given underlyings
    pub fn with_underlyings(underlyings: Vec<UnderlyingSpec>) -> Self {
        Config {
            exchange_segment: default_exchange_segment(),
            risk_free_rate: default_risk_free_rate(),
            dividend_yield: 0.0,
            default_budget: default_budget(),
            max_picks: default_max_picks(),
            tick_size: default_tick_size(),
            underlyings,
            bias: BiasConfig::default(),
            zones: ZoneConfig::default(),
            universe: UniverseConfig::default(),
            pricing: PricingConfig::default(),
            gates: GateConfig::default(),
            scoring: ScoringConfig::default(),
            exits: ExitPolicy::default(),
            quotes: QuoteBatchConfig::default(),
            kite: KiteConfig::default(),
        }
    }
}

/// Daily-bias indicator settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BiasConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub min_bars: usize,
    pub lookback_days: i64,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub stoch_overbought: f64,
    pub stoch_oversold: f64,
    pub atr_period: usize,
}

impl Default for BiasConfig {
    fn default() -> Self {
        BiasConfig {
            ema_fast: 5,
            ema_slow: 10,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            min_bars: 15,
            lookback_days: 60,
            stoch_k_period: 14,
            stoch_d_period: 3,
            stoch_overbought: 80.0,
            stoch_oversold: 20.0,
            atr_period: 14,
        }
    }
}

/// Zone bounds convention for a detected order block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneBounds {
    /// Supply [open, high], demand [low, open]
    BodyWick,
    /// [low, high] on both sides
    FullRange,
}

/// Order-block detection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub timeframe: Timeframe,
    pub lookback_days: i64,
    pub min_candles: usize,
    pub confirmation_bars: usize,
    pub bounds: ZoneBounds,
    pub in_zone_buffer_pct: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        ZoneConfig {
            timeframe: Timeframe::FifteenMinute,
            lookback_days: 5,
            min_candles: 20,
            confirmation_bars: 1,
            bounds: ZoneBounds::BodyWick,
            in_zone_buffer_pct: 0.0,
        }
    }
}

/// Strike ring settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Strike steps on each side of ATM
    pub strike_steps: usize,
    /// Percentage band around the reference price
    pub band_pct: f64,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        UniverseConfig {
            strike_steps: 2,
            band_pct: 2.0,
        }
    }
}

/// Implied-volatility solver settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub iv_lower: f64,
    pub iv_upper: f64,
    pub max_bracket_expansions: u32,
    pub price_tolerance: f64,
    pub max_iterations: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            iv_lower: 1e-4,
            iv_upper: 3.0,
            max_bracket_expansions: 4,
            price_tolerance: 1e-6,
            max_iterations: 200,
        }
    }
}

/// What to do with a candidate whose Greeks could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingGreeksPolicy {
    /// Keep the TA trade type and note the missing Greeks
    PassThrough,
    /// Force the candidate to SHORT
    DemoteToShort,
}

/// Greeks thresholds for the trade-type gate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub long_iv_min: f64,
    pub long_iv_max: f64,
    pub call_delta_min: f64,
    pub call_delta_max: f64,
    /// Absolute delta band for puts
    pub put_delta_min: f64,
    pub put_delta_max: f64,
    pub gamma_max: f64,
    /// Max |theta| per day as percent of premium
    pub theta_pct_max: f64,
    pub short_iv_min: f64,
    pub missing_greeks: MissingGreeksPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            long_iv_min: 0.08,
            long_iv_max: 0.60,
            call_delta_min: 0.30,
            call_delta_max: 0.70,
            put_delta_min: 0.30,
            put_delta_max: 0.70,
            gamma_max: 0.05,
            theta_pct_max: 10.0,
            short_iv_min: 0.15,
            missing_greeks: MissingGreeksPolicy::PassThrough,
        }
    }
}

/// Composite score weights
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub volume_weight: f64,
    pub spread_weight: f64,
    pub affordability_weight: f64,
    /// Relative spread assumed when depth is unavailable
    pub spread_fallback: f64,
    pub alignment_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            volume_weight: 0.6,
            spread_weight: 0.3,
            affordability_weight: 0.1,
            spread_fallback: 0.05,
            alignment_bonus: 0.2,
        }
    }
}

/// Take-profit / stop-loss derivation
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Fractions of premium, e.g. target 0.3 = 30% move in our favour
    Percent { target: f64, stop: f64 },
    /// Premium multiples for a LONG, e.g. target 1.5, stop 0.7
    Multiple { target: f64, stop: f64 },
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy::Percent {
            target: 0.30,
            stop: 0.20,
        }
    }
}

/// Batch size ladder and retry budget for quote fetching
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteBatchConfig {
    pub batch_sizes: Vec<usize>,
    pub per_symbol_retries: u32,
}

impl Default for QuoteBatchConfig {
    fn default() -> Self {
        QuoteBatchConfig {
            batch_sizes: vec![200, 50, 10],
            per_symbol_retries: 2,
        }
    }
}

/// Kite Connect REST credentials and pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KiteConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: String,
    pub timeout_secs: u64,
    pub quote_requests_per_sec: u32,
    pub historical_requests_per_sec: u32,
}

impl Default for KiteConfig {
    fn default() -> Self {
        KiteConfig {
            base_url: "https://api.kite.trade".to_string(),
            api_key: String::new(),
            access_token: String::new(),
            timeout_secs: 30,
            quote_requests_per_sec: 1,
            historical_requests_per_sec: 3,
        }
    }
}
