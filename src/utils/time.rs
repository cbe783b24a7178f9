/// Time and price-grid utilities for exchange sessions
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Kolkata;

const DAYS_PER_YEAR: f64 = 365.0;

/// Exchange-local calendar date for a UTC instant
pub fn exchange_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Kolkata).date_naive()
}

/// Calendar days from `today` to `expiry`, never negative
pub fn days_to_expiry(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days().max(0)
}

/// Year fraction for a day count, floored at one day so expiry day is priceable
pub fn year_fraction(days: i64) -> f64 {
    (days.max(1) as f64) / DAYS_PER_YEAR
}

/// Round to the nearest tick (half-up on the tick ratio)
pub fn round_to_tick(price: f64, tick: f64) -> f64 {
    if tick <= 0.0 {
        return price;
    }
    // Snap the ratio first so 2.275 / 0.05 = 45.4999.. counts as an exact half
    let ratio = ((price / tick) * 1e9).round() / 1e9;
    let ticks = (ratio + 0.5).floor();
    // Trim float noise such as 12.350000000000001
    ((ticks * tick) * 1e8).round() / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_exchange_date_rolls_at_ist_midnight() {
        // 19:00 UTC is 00:30 IST next day
        let late = Utc.with_ymd_and_hms(2025, 1, 15, 19, 0, 0).unwrap();
        assert_eq!(exchange_date(late), NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());

        let morning = Utc.with_ymd_and_hms(2025, 1, 15, 4, 0, 0).unwrap();
        assert_eq!(exchange_date(morning), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn test_days_and_year_fraction() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let expiry = NaiveDate::from_ymd_opt(2025, 1, 23).unwrap();
        assert_eq!(days_to_expiry(expiry, today), 8);
        assert_eq!(days_to_expiry(today, expiry), 0);
        assert_eq!(year_fraction(0), 1.0 / 365.0);
        assert_eq!(year_fraction(73), 0.2);
    }

    #[test]
    fn test_round_to_tick() {
        assert_eq!(round_to_tick(12.34, 0.05), 12.35);
        assert_eq!(round_to_tick(12.32, 0.05), 12.3);
        // Exact half rounds up
        assert_eq!(round_to_tick(2.25, 0.5), 2.5);
        assert_eq!(round_to_tick(1.75 * 1.3, 0.05), 2.3);
        assert_eq!(round_to_tick(1.75 * 0.8, 0.05), 1.4);
        assert_eq!(round_to_tick(65.0, 0.05), 65.0);
        assert_eq!(round_to_tick(7.0, 0.0), 7.0);
    }
}
