/// Daily bias resolver using EMA crossover, pivots and RSI
/// Determines BULLISH/BEARISH/NEUTRAL for each underlying

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::strategy::indicators::{atr_percent, closes, ema, pivot_points, rsi, stochastic, PivotPoints, StochasticReading};
use crate::strategy::zones::ZoneLocation;
use crate::types::{BiasConfig, Candle, OptionType, TradeType};

/// Daily bias direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BiasDirection {
    Bullish, // EMA fast > slow, close > R1, RSI < overbought
    Bearish, // EMA fast < slow, close < S1, RSI > oversold
    Neutral,
}

impl BiasDirection {
    pub fn as_str(&self) -> &str {
        match self {
            BiasDirection::Bullish => "BULLISH",
            BiasDirection::Bearish => "BEARISH",
            BiasDirection::Neutral => "NEUTRAL",
        }
    }

    /// Option sides worth scanning under this bias
    pub fn eligible_sides(&self) -> &'static [OptionType] {
        match self {
            BiasDirection::Bullish => &[OptionType::CE],
            BiasDirection::Bearish => &[OptionType::PE],
            BiasDirection::Neutral => &[OptionType::CE, OptionType::PE],
        }
    }

    /// Side agrees with the directional call
    pub fn aligns_with(&self, side: OptionType) -> bool {
        matches!(
            (self, side),
            (BiasDirection::Bullish, OptionType::CE) | (BiasDirection::Bearish, OptionType::PE)
        )
    }
}

/// Indicator values behind a bias call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BiasDiagnostics {
    pub bars: usize,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub pivots: Option<PivotPoints>,
    pub stochastic: Option<StochasticReading>,
    pub atr_pct: Option<f64>,
}

/// Bias result for one underlying
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bias {
    pub underlying: String,
    pub direction: BiasDirection,
    pub close_price: Option<f64>,
    pub diagnostics: BiasDiagnostics,
}

impl Bias {
    /// Neutral bias for an underlying with no usable history
    pub fn neutral(underlying: &str) -> Self {
        Bias {
            underlying: underlying.to_string(),
            direction: BiasDirection::Neutral,
            close_price: None,
            diagnostics: BiasDiagnostics::default(),
        }
    }
}

/// Daily bias calculator
pub struct BiasResolver {
    config: BiasConfig,
}

impl BiasResolver {
    pub fn new(config: BiasConfig) -> Self {
        Self { config }
    }

    /// Calculate bias for single underlying. Short history is NEUTRAL, not an error.
    pub fn resolve(&self, underlying: &str, daily_candles: &[Candle]) -> Bias {
        if daily_candles.len() < self.config.min_bars.max(2) {
            warn!("{}: Not enough daily bars ({} < {}), bias NEUTRAL",
                  underlying, daily_candles.len(), self.config.min_bars);
            let mut bias = Bias::neutral(underlying);
            bias.close_price = daily_candles.last().map(|c| c.close);
            bias.diagnostics.bars = daily_candles.len();
            return bias;
        }

        let all_closes = closes(daily_candles);
        let last = daily_candles.len() - 1;
        let close = daily_candles[last].close;
        let prev = &daily_candles[last - 1];

        let rsi_period = self.config.rsi_period.min(last);
        let diagnostics = BiasDiagnostics {
            bars: daily_candles.len(),
            ema_fast: ema(&all_closes, self.config.ema_fast),
            ema_slow: ema(&all_closes, self.config.ema_slow),
            rsi: rsi(&all_closes, rsi_period),
            pivots: Some(pivot_points(prev.high, prev.low, prev.close)),
            stochastic: stochastic(daily_candles, self.config.stoch_k_period, self.config.stoch_d_period),
            atr_pct: atr_percent(daily_candles, self.config.atr_period),
        };

        let direction = self.classify(close, &diagnostics);

        debug!("{} @ {:.2} → {} (EMA {:?}/{:?}, RSI {:?})",
               underlying, close, direction.as_str(),
               diagnostics.ema_fast, diagnostics.ema_slow, diagnostics.rsi);

        Bias {
            underlying: underlying.to_string(),
            direction,
            close_price: Some(close),
            diagnostics,
        }
    }

    fn classify(&self, close: f64, d: &BiasDiagnostics) -> BiasDirection {
        let (Some(fast), Some(slow), Some(rsi), Some(pivots)) = (d.ema_fast, d.ema_slow, d.rsi, d.pivots) else {
            return BiasDirection::Neutral;
        };

        if fast > slow && close > pivots.r1 && rsi < self.config.rsi_overbought {
            BiasDirection::Bullish
        } else if fast < slow && close < pivots.s1 && rsi > self.config.rsi_oversold {
            BiasDirection::Bearish
        } else {
            BiasDirection::Neutral
        }
    }

    /// TA trade type for one option side before any Greeks gating
    pub fn base_trade_type(
        &self,
        bias: &Bias,
        side: OptionType,
        zone: ZoneLocation,
    ) -> (TradeType, String) {
        let stoch = bias.diagnostics.stochastic;

        match bias.direction {
            BiasDirection::Bullish | BiasDirection::Bearish if bias.direction.aligns_with(side) => {
                let exhausted = stoch.is_some_and(|s| match bias.direction {
                    BiasDirection::Bullish => s.k > self.config.stoch_overbought && s.crossed_down(),
                    _ => s.k < self.config.stoch_oversold && s.crossed_up(),
                });
                if exhausted {
                    (TradeType::Short, format!("{} trend exhausted (stochastic cross)", bias.direction.as_str()))
                } else {
                    (TradeType::Long, format!("{} trend confirmed", bias.direction.as_str()))
                }
            }
            BiasDirection::Bullish | BiasDirection::Bearish => {
                (TradeType::Short, format!("{} against {} bias", side.as_str(), bias.direction.as_str()))
            }
            BiasDirection::Neutral => match (zone, side) {
                (ZoneLocation::InDemandZone, OptionType::CE) => {
                    (TradeType::Long, "price in demand zone".to_string())
                }
                (ZoneLocation::InSupplyZone, OptionType::PE) => {
                    (TradeType::Long, "price in supply zone".to_string())
                }
                (ZoneLocation::InDemandZone, OptionType::PE) | (ZoneLocation::InSupplyZone, OptionType::CE) => {
                    (TradeType::Short, "fading side opposite the active zone".to_string())
                }
                (ZoneLocation::Outside, _) => {
                    (TradeType::Short, "neutral bias, range-bound premium".to_string())
                }
            },
        }
    }
}
