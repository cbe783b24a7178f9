/// Technical indicators implementation
use serde::{Deserialize, Serialize};

use crate::types::Candle;

/// Floor for the stochastic range so a flat window never divides by zero
const STOCH_EPSILON: f64 = 1e-9;

/// Classic floor pivots from the previous bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoints {
    pub pp: f64,
    pub r1: f64,
    pub s1: f64,
}

/// Latest and previous %K/%D pairs, enough to detect a crossover
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticReading {
    pub k: f64,
    pub d: f64,
    pub prev_k: f64,
    pub prev_d: f64,
}

impl StochasticReading {
    /// %K moved from at/below %D to above it on the latest bar
    pub fn crossed_up(&self) -> bool {
        self.prev_k <= self.prev_d && self.k > self.d
    }

    /// %K moved from at/above %D to below it on the latest bar
    pub fn crossed_down(&self) -> bool {
        self.prev_k >= self.prev_d && self.k < self.d
    }
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// EMA series seeded with the first close, k = 2/(period+1)
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let k = 2.0 / (period as f64 + 1.0);

    let mut ema = first;
    values
        .iter()
        .map(|&v| {
            ema = v * k + ema * (1.0 - k);
            ema
        })
        .collect()
}

/// Latest EMA value
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// Wilder RSI over the whole series. None with fewer than period+1 closes.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    // Seed from the first `period` deltas
    let mut avg_gain = deltas[..period].iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = deltas[..period].iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;

    let p = period as f64;
    for delta in &deltas[period..] {
        avg_gain = ((p - 1.0) * avg_gain + delta.max(0.0)) / p;
        avg_loss = ((p - 1.0) * avg_loss + (-delta).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// PP=(H+L+C)/3, R1=2PP-L, S1=2PP-H
pub fn pivot_points(prev_high: f64, prev_low: f64, prev_close: f64) -> PivotPoints {
    let pp = (prev_high + prev_low + prev_close) / 3.0;
    PivotPoints {
        pp,
        r1: 2.0 * pp - prev_low,
        s1: 2.0 * pp - prev_high,
    }
}

/// %K for the window ending at `end` (inclusive)
fn percent_k(candles: &[Candle], end: usize, k_period: usize) -> f64 {
    let window = &candles[end + 1 - k_period..=end];
    let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let range = (highest - lowest).max(STOCH_EPSILON);

    (100.0 * (candles[end].close - lowest) / range).clamp(0.0, 100.0)
}

/// Stochastic %K/%D. Needs k_period + d_period candles for the previous pair.
pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> Option<StochasticReading> {
    if k_period == 0 || d_period == 0 || candles.len() < k_period + d_period {
        return None;
    }

    // %K values for the last d_period + 1 bars
    let last = candles.len() - 1;
    let ks: Vec<f64> = (last - d_period..=last)
        .map(|end| percent_k(candles, end, k_period))
        .collect();

    let d = ks[1..].iter().sum::<f64>() / d_period as f64;
    let prev_d = ks[..d_period].iter().sum::<f64>() / d_period as f64;

    Some(StochasticReading {
        k: ks[d_period],
        d,
        prev_k: ks[d_period - 1],
        prev_d,
    })
}

/// True range of `bar` against the previous close
fn true_range(bar: &Candle, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max(f64::abs(bar.high - prev_close))
        .max(f64::abs(bar.low - prev_close))
}

/// Mean true range over the trailing window as a percent of the latest close
pub fn atr_percent(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let start = candles.len() - period;
    let atr = (start..candles.len())
        .map(|i| true_range(&candles[i], candles[i - 1].close))
        .sum::<f64>()
        / period as f64;

    let close = candles.last()?.close;
    if close <= 0.0 {
        return None;
    }

    Some(atr / close * 100.0)
}
