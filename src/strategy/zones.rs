/// Order-block (supply/demand zone) detection
/// A displacement candle whose next close breaks its range leaves a zone
/// that stays active until a later candle trades back into it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::strategy::indicators::{closes, ema, rsi};
use crate::types::{Candle, ZoneBounds, ZoneConfig};

/// Volume spike multiple over the trailing average
const VOLUME_SPIKE_MULTIPLE: f64 = 1.5;
/// Candles averaged for the volume baseline, excluding the latest
const VOLUME_BASELINE_BARS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneSide {
    Supply,
    Demand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub low: f64,
    pub high: f64,
    pub timestamp: DateTime<Utc>,
    pub side: ZoneSide,
}

impl Zone {
    fn new(a: f64, b: f64, timestamp: DateTime<Utc>, side: ZoneSide) -> Self {
        Zone {
            low: a.min(b),
            high: a.max(b),
            timestamp,
            side,
        }
    }

    /// Inclusive bounds test widened by `buffer_pct` percent on each side
    pub fn contains(&self, price: f64, buffer_pct: f64) -> bool {
        let buffer = buffer_pct.max(0.0) / 100.0;
        price >= self.low * (1.0 - buffer) && price <= self.high * (1.0 + buffer)
    }

    fn overlaps(&self, candle: &Candle) -> bool {
        candle.low <= self.high && candle.high >= self.low
    }
}

/// Unmitigated zones in time order, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSet {
    pub demand: Vec<Zone>,
    pub supply: Vec<Zone>,
}

/// Where the price sits relative to the active zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneLocation {
    InDemandZone,
    InSupplyZone,
    Outside,
}

impl ZoneSet {
    pub fn active_demand(&self) -> Option<&Zone> {
        self.demand.last()
    }

    pub fn active_supply(&self) -> Option<&Zone> {
        self.supply.last()
    }

    /// Supply takes precedence when price sits in both active zones
    pub fn locate(&self, price: f64, buffer_pct: f64) -> (ZoneLocation, Option<&Zone>) {
        if let Some(zone) = self.active_supply().filter(|z| z.contains(price, buffer_pct)) {
            return (ZoneLocation::InSupplyZone, Some(zone));
        }
        if let Some(zone) = self.active_demand().filter(|z| z.contains(price, buffer_pct)) {
            return (ZoneLocation::InDemandZone, Some(zone));
        }
        (ZoneLocation::Outside, None)
    }
}

/// Detect unmitigated supply and demand zones.
/// Fewer than 3 candles yields an empty set.
pub fn detect_zones(candles: &[Candle], config: &ZoneConfig) -> ZoneSet {
    let mut zones = ZoneSet::default();
    let confirm = config.confirmation_bars.max(1);

    if candles.len() < 3 || candles.len() < confirm + 2 {
        return zones;
    }

    for i in 1..candles.len() - confirm {
        let source = &candles[i];
        let confirming = &candles[i + 1..=i + confirm];
        let later = &candles[i + confirm + 1..];

        // Supply: up candle, then closes below its low
        if source.close > source.open && confirming.iter().all(|c| c.close < source.low) {
            let zone = match config.bounds {
                ZoneBounds::BodyWick => Zone::new(source.open, source.high, source.timestamp, ZoneSide::Supply),
                ZoneBounds::FullRange => Zone::new(source.low, source.high, source.timestamp, ZoneSide::Supply),
            };
            if !later.iter().any(|c| zone.overlaps(c)) {
                zones.supply.push(zone);
            }
        }

        // Demand: down candle, then closes above its high
        if source.close < source.open && confirming.iter().all(|c| c.close > source.high) {
            let zone = match config.bounds {
                ZoneBounds::BodyWick => Zone::new(source.low, source.open, source.timestamp, ZoneSide::Demand),
                ZoneBounds::FullRange => Zone::new(source.low, source.high, source.timestamp, ZoneSide::Demand),
            };
            if !later.iter().any(|c| zone.overlaps(c)) {
                zones.demand.push(zone);
            }
        }
    }

    debug!(
        "Zones: {} demand, {} supply from {} candles",
        zones.demand.len(),
        zones.supply.len(),
        candles.len()
    );

    zones
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

/// Order-block status of one underlying on the zone timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSignal {
    pub underlying: String,
    pub status: ZoneLocation,
    pub zone: Option<Zone>,
    pub price: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub rsi: Option<f64>,
    pub volume_spike: bool,
    pub trend: Trend,
}

/// Latest volume against the mean of the preceding bars
fn is_volume_spike(candles: &[Candle]) -> bool {
    if candles.len() < VOLUME_BASELINE_BARS + 1 {
        return false;
    }
    let last = candles.len() - 1;
    let baseline = &candles[last - VOLUME_BASELINE_BARS..last];
    let mean = baseline.iter().map(|c| c.volume as f64).sum::<f64>() / VOLUME_BASELINE_BARS as f64;

    candles[last].volume as f64 > VOLUME_SPIKE_MULTIPLE * mean
}

/// Evaluate the latest close against zones built from the bars before it.
/// None below `min_candles`.
pub fn assess_zone_status(underlying: &str, candles: &[Candle], config: &ZoneConfig) -> Option<ZoneSignal> {
    if candles.len() < config.min_candles.max(3) {
        return None;
    }

    let (current, history) = candles.split_last()?;
    let zones = detect_zones(history, config);
    let price = current.close;
    let all_closes = closes(candles);

    let ema20 = ema(&all_closes[all_closes.len().saturating_sub(20)..], 20)?;
    let ema50 = if all_closes.len() >= 50 {
        ema(&all_closes[all_closes.len() - 50..], 50)?
    } else {
        ema20
    };
    let rsi = rsi(&all_closes[all_closes.len().saturating_sub(15)..], 14);

    let (status, zone) = zones.locate(price, config.in_zone_buffer_pct);
    let trend = match status {
        ZoneLocation::InDemandZone if price > ema20 => Trend::Bullish,
        ZoneLocation::InSupplyZone if price < ema20 => Trend::Bearish,
        _ => Trend::Neutral,
    };

    Some(ZoneSignal {
        underlying: underlying.to_string(),
        status,
        zone: zone.cloned(),
        price,
        ema20,
        ema50,
        rsi,
        volume_spike: is_volume_spike(candles),
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::indicators::tests::candle;

    fn rising(start_idx: usize, count: usize, start_base: f64) -> Vec<Candle> {
        (0..count)
            .map(|j| {
                let base = start_base + j as f64 * 2.0;
                candle(start_idx + j, base, base + 2.0, base - 0.5, base + 1.5)
            })
            .collect()
    }

    /// 20 daily bars: steady climb, one down candle at index 10, breakout at 11
    fn demand_series() -> Vec<Candle> {
        let mut candles = rising(0, 10, 100.0);
        candles.push(candle(10, 120.0, 120.5, 117.5, 118.0));
        candles.push(candle(11, 118.5, 122.5, 118.4, 122.0));
        candles.extend(rising(12, 8, 123.0));
        candles
    }

    #[test]
    fn test_single_demand_zone_body_wick() {
        let candles = demand_series();
        assert_eq!(candles.len(), 20);

        let zones = detect_zones(&candles, &ZoneConfig::default());
        assert_eq!(zones.demand.len(), 1);
        assert!(zones.supply.is_empty());

        let zone = zones.active_demand().unwrap();
        assert_eq!(zone.side, ZoneSide::Demand);
        assert_eq!((zone.low, zone.high), (117.5, 120.0));
        assert_eq!(zone.timestamp, candles[10].timestamp);
    }

    #[test]
    fn test_strict_confirmation_full_range() {
        let config = ZoneConfig {
            confirmation_bars: 2,
            bounds: ZoneBounds::FullRange,
            ..ZoneConfig::default()
        };
        let zones = detect_zones(&demand_series(), &config);
        assert_eq!(zones.demand.len(), 1);
        let zone = &zones.demand[0];
        assert_eq!((zone.low, zone.high), (117.5, 120.5));
    }

    #[test]
    fn test_supply_zone() {
        let candles = vec![
            candle(0, 100.0, 101.0, 99.0, 100.5),
            candle(1, 100.0, 104.0, 99.5, 103.0),
            candle(2, 99.0, 99.2, 96.0, 97.0),
            candle(3, 96.5, 97.5, 95.0, 95.5),
        ];
        let zones = detect_zones(&candles, &ZoneConfig::default());
        assert_eq!(zones.supply.len(), 1);
        let zone = zones.active_supply().unwrap();
        assert_eq!((zone.low, zone.high), (100.0, 104.0));
        assert_eq!(zones.locate(102.0, 0.0).0, ZoneLocation::InSupplyZone);
        assert_eq!(zones.locate(105.0, 0.0).0, ZoneLocation::Outside);
        assert_eq!(zones.locate(104.5, 1.0).0, ZoneLocation::InSupplyZone);
    }

    #[test]
    fn test_short_series_is_empty() {
        let candles = rising(0, 2, 100.0);
        assert_eq!(detect_zones(&candles, &ZoneConfig::default()), ZoneSet::default());
        assert_eq!(detect_zones(&[], &ZoneConfig::default()), ZoneSet::default());
    }

    #[test]
    fn test_mitigation_is_monotonic() {
        let mut candles = demand_series();
        // Trades back into [117.5, 120.0]
        candles.push(candle(20, 139.0, 139.5, 119.0, 121.0));
        candles.extend(rising(21, 5, 122.0));

        let config = ZoneConfig::default();
        let source_ts = candles[10].timestamp;
        for n in 12..=20 {
            let zones = detect_zones(&candles[..n], &config);
            assert!(zones.demand.iter().any(|z| z.timestamp == source_ts), "prefix {}", n);
        }
        for n in 21..=candles.len() {
            let zones = detect_zones(&candles[..n], &config);
            assert!(!zones.demand.iter().any(|z| z.timestamp == source_ts), "prefix {}", n);
        }
    }

    fn pullback_series() -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..15)
            .map(|i| candle(i, 100.0, 100.5, 99.8, 100.2))
            .collect();
        candles.push(candle(15, 100.2, 110.5, 100.1, 110.0));
        candles.push(candle(16, 112.0, 112.5, 108.5, 109.0));
        candles.push(candle(17, 109.5, 114.5, 109.4, 114.0));
        candles.push(candle(18, 114.0, 115.5, 113.0, 115.0));
        let mut current = candle(19, 113.0, 113.2, 110.0, 111.0);
        current.volume = 5_000;
        candles.push(current);
        candles
    }

    #[test]
    fn test_zone_status_in_demand() {
        let signal = assess_zone_status("NIFTY", &pullback_series(), &ZoneConfig::default()).unwrap();
        assert_eq!(signal.status, ZoneLocation::InDemandZone);
        let zone = signal.zone.unwrap();
        assert_eq!((zone.low, zone.high), (108.5, 112.0));
        assert_eq!(signal.price, 111.0);
        assert!(signal.ema20 < signal.price);
        assert_eq!(signal.trend, Trend::Bullish);
        assert_eq!(signal.ema50, signal.ema20);
        assert!(signal.volume_spike);
        assert!(signal.rsi.is_some());
    }

    #[test]
    fn test_zone_status_outside() {
        let signal = assess_zone_status("NIFTY", &demand_series(), &ZoneConfig::default()).unwrap();
        assert_eq!(signal.status, ZoneLocation::Outside);
        assert!(signal.zone.is_none());
        assert_eq!(signal.trend, Trend::Neutral);
        assert!(!signal.volume_spike);
    }

    #[test]
    fn test_zone_status_needs_min_candles() {
        let candles = rising(0, 10, 100.0);
        assert!(assess_zone_status("NIFTY", &candles, &ZoneConfig::default()).is_none());
    }
}
