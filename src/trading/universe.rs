/// Universe resolver: expiry, ATM strike and strike ring per underlying

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ScanError};
use crate::strategy::BiasDirection;
use crate::types::{Instrument, OptionType, UniverseConfig};

const STRIKE_EPSILON: f64 = 1e-6;

/// Contracts selected for one underlying
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingUniverse {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub reference_price: Option<f64>,
    pub atm_strike: f64,
    /// Sorted ascending
    pub strikes: Vec<f64>,
    pub sides: Vec<OptionType>,
    pub contracts: Vec<Instrument>,
}

/// Keep instruments of the configured underlyings. Errors when none match.
pub fn filter_universe<'a>(instruments: &'a [Instrument], underlyings: &[String]) -> Result<Vec<&'a Instrument>> {
    let filtered: Vec<&Instrument> = instruments
        .iter()
        .filter(|i| underlyings.iter().any(|u| u == &i.name))
        .collect();

    if filtered.is_empty() {
        return Err(ScanError::EmptyUniverse(format!(
            "no option contracts for {}",
            underlyings.join(", ")
        )));
    }
    Ok(filtered)
}

/// Nearest expiry on or after `today`, else the latest listed
pub fn select_expiry<'a, I>(expiries: I, today: NaiveDate) -> Option<NaiveDate>
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let mut upcoming: Option<NaiveDate> = None;
    let mut latest: Option<NaiveDate> = None;

    for &expiry in expiries {
        latest = Some(latest.map_or(expiry, |l| l.max(expiry)));
        if expiry >= today {
            upcoming = Some(upcoming.map_or(expiry, |u| u.min(expiry)));
        }
    }
    upcoming.or(latest)
}

/// Index of the listed strike nearest `reference`, or the median without one
pub fn atm_index(strikes: &[f64], reference: Option<f64>) -> Option<usize> {
    if strikes.is_empty() {
        return None;
    }
    match reference {
        Some(price) => strikes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - price).abs().total_cmp(&(*b - price).abs()))
            .map(|(i, _)| i),
        None => Some(strikes.len() / 2),
    }
}

pub struct UniverseResolver {
    config: UniverseConfig,
}

impl UniverseResolver {
    pub fn new(config: UniverseConfig) -> Self {
        Self { config }
    }

    /// Strike steps around ATM united with the percentage band around `center`
    pub fn strike_ring(&self, strikes: &[f64], atm: usize, center: f64) -> Vec<f64> {
        if strikes.is_empty() {
            return Vec::new();
        }
        let lo = atm.saturating_sub(self.config.strike_steps);
        let hi = (atm + self.config.strike_steps).min(strikes.len() - 1);
        let band = center.abs() * self.config.band_pct.max(0.0) / 100.0;

        strikes
            .iter()
            .enumerate()
            .filter(|(i, s)| (lo..=hi).contains(i) || (**s - center).abs() <= band)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Resolve the contracts to scan for one underlying
    pub fn resolve(
        &self,
        instruments: &[&Instrument],
        underlying: &str,
        direction: BiasDirection,
        reference: Option<f64>,
        today: NaiveDate,
    ) -> Result<UnderlyingUniverse> {
        let listed: Vec<&Instrument> = instruments
            .iter()
            .copied()
            .filter(|i| i.name == underlying)
            .collect();

        let expiry = select_expiry(listed.iter().map(|i| &i.expiry), today)
            .ok_or_else(|| ScanError::NoExpiry(underlying.to_string()))?;

        let mut strikes: Vec<f64> = listed
            .iter()
            .filter(|i| i.expiry == expiry)
            .map(|i| i.strike)
            .collect();
        strikes.sort_by(|a, b| a.total_cmp(b));
        strikes.dedup_by(|a, b| (*a - *b).abs() < STRIKE_EPSILON);

        let atm = atm_index(&strikes, reference)
            .ok_or_else(|| ScanError::EmptyStrikeRing(format!("{}: no strikes for {}", underlying, expiry)))?;
        let atm_strike = strikes[atm];
        let ring = self.strike_ring(&strikes, atm, reference.unwrap_or(atm_strike));

        let sides = direction.eligible_sides().to_vec();
        let mut contracts: Vec<Instrument> = listed
            .iter()
            .filter(|i| i.expiry == expiry && sides.contains(&i.option_type))
            .filter(|i| ring.iter().any(|s| (s - i.strike).abs() < STRIKE_EPSILON))
            .map(|i| (*i).clone())
            .collect();
        contracts.sort_by(|a, b| {
            a.strike
                .total_cmp(&b.strike)
                .then_with(|| a.option_type.as_str().cmp(b.option_type.as_str()))
        });

        if contracts.is_empty() {
            return Err(ScanError::EmptyStrikeRing(format!(
                "{}: no {} contracts around {}",
                underlying,
                sides.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("/"),
                atm_strike
            )));
        }

        if reference.is_none() {
            debug!("{}: no reference price, ATM from median strike {}", underlying, atm_strike);
        }
        info!("   {} expiry {} ATM {} → {} strikes, {} contracts",
              underlying, expiry, atm_strike, ring.len(), contracts.len());

        Ok(UnderlyingUniverse {
            underlying: underlying.to_string(),
            expiry,
            reference_price: reference,
            atm_strike,
            strikes: ring,
            sides,
            contracts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::{base_expiry, option};

    fn chain(name: &str, strikes: &[f64], days: i64) -> Vec<Instrument> {
        strikes
            .iter()
            .flat_map(|&k| [option(name, OptionType::CE, k, days), option(name, OptionType::PE, k, days)])
            .collect()
    }

    fn resolver() -> UniverseResolver {
        UniverseResolver::new(UniverseConfig {
            strike_steps: 1,
            band_pct: 0.0,
        })
    }

    #[test]
    fn test_select_expiry() {
        let today = base_expiry() + chrono::Duration::days(5);
        let dates = [
            base_expiry(),
            base_expiry() + chrono::Duration::days(7),
            base_expiry() + chrono::Duration::days(14),
        ];
        assert_eq!(select_expiry(dates.iter(), today), Some(dates[1]));
        // All expired: fall back to the latest
        let later = base_expiry() + chrono::Duration::days(30);
        assert_eq!(select_expiry(dates.iter(), later), Some(dates[2]));
        assert_eq!(select_expiry([].iter(), today), None);
    }

    #[test]
    fn test_atm_nearest_and_median() {
        let strikes = [24_800.0, 24_900.0, 25_000.0, 25_100.0];
        assert_eq!(atm_index(&strikes, Some(24_940.0)), Some(1));
        assert_eq!(atm_index(&strikes, Some(99_999.0)), Some(3));
        assert_eq!(atm_index(&strikes, None), Some(2));
        assert_eq!(atm_index(&[], Some(1.0)), None);
    }

    #[test]
    fn test_ring_unions_steps_and_band() {
        let resolver = UniverseResolver::new(UniverseConfig {
            strike_steps: 1,
            band_pct: 1.0,
        });
        // Irregular spacing: band catches 24_760 which is two steps away
        let strikes = [24_500.0, 24_700.0, 24_760.0, 24_900.0, 25_000.0, 25_600.0];
        let ring = resolver.strike_ring(&strikes, 4, 24_990.0);
        assert_eq!(ring, vec![24_760.0, 24_900.0, 25_000.0, 25_600.0]);
    }

    #[test]
    fn test_ring_always_contains_atm() {
        let mut seed: u64 = 42;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as f64 / (1u64 << 31) as f64
        };

        for steps in 0..3 {
            for band in [0.0, 0.5, 3.0] {
                let resolver = UniverseResolver::new(UniverseConfig { strike_steps: steps, band_pct: band });
                for _ in 0..50 {
                    let count = 1 + (next() * 30.0) as usize;
                    let mut strikes: Vec<f64> = (0..count).map(|_| (next() * 400.0).round() * 50.0 + 100.0).collect();
                    strikes.sort_by(|a, b| a.total_cmp(b));
                    strikes.dedup();

                    let reference = if next() < 0.2 { None } else { Some(next() * 25_000.0) };
                    let atm = atm_index(&strikes, reference).unwrap();
                    let ring = resolver.strike_ring(&strikes, atm, reference.unwrap_or(strikes[atm]));
                    assert!(ring.contains(&strikes[atm]));
                }
            }
        }
    }

    #[test]
    fn test_resolve_bullish_keeps_calls() {
        let instruments = chain("NIFTY", &[24_800.0, 24_900.0, 25_000.0, 25_100.0, 25_200.0], 7);
        let refs: Vec<&Instrument> = instruments.iter().collect();
        let universe = resolver()
            .resolve(&refs, "NIFTY", BiasDirection::Bullish, Some(25_020.0), base_expiry())
            .unwrap();

        assert_eq!(universe.atm_strike, 25_000.0);
        assert_eq!(universe.strikes, vec![24_900.0, 25_000.0, 25_100.0]);
        assert_eq!(universe.contracts.len(), 3);
        assert!(universe.contracts.iter().all(|c| c.option_type == OptionType::CE));
    }

    #[test]
    fn test_resolve_neutral_uses_nearest_expiry_and_both_sides() {
        let mut instruments = chain("NIFTY", &[24_900.0, 25_000.0, 25_100.0], 14);
        instruments.extend(chain("NIFTY", &[24_900.0, 25_000.0, 25_100.0], 7));
        let refs: Vec<&Instrument> = instruments.iter().collect();

        let universe = resolver()
            .resolve(&refs, "NIFTY", BiasDirection::Neutral, None, base_expiry())
            .unwrap();
        assert_eq!(universe.expiry, base_expiry() + chrono::Duration::days(7));
        assert_eq!(universe.atm_strike, 25_000.0);
        assert_eq!(universe.contracts.len(), 6);
    }

    #[test]
    fn test_filter_and_missing_underlying() {
        let instruments = chain("NIFTY", &[25_000.0], 7);
        assert!(matches!(
            filter_universe(&instruments, &["BANKNIFTY".to_string()]),
            Err(ScanError::EmptyUniverse(_))
        ));

        let refs = filter_universe(&instruments, &["NIFTY".to_string()]).unwrap();
        assert_eq!(refs.len(), 2);
        assert!(matches!(
            resolver().resolve(&refs, "BANKNIFTY", BiasDirection::Neutral, None, base_expiry()),
            Err(ScanError::NoExpiry(_))
        ));
    }
}
