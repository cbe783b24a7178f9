pub mod black_scholes;

pub use black_scholes::{bs_price, greeks, implied_volatility, norm_cdf, norm_pdf, Greeks};

use tracing::debug;

use crate::types::{OptionType, PricingConfig};
use crate::utils::year_fraction;

/// Prices candidates at a fixed rate/carry and backs out IV and Greeks
#[derive(Debug, Clone)]
pub struct GreeksEngine {
    rate: f64,
    dividend_yield: f64,
    config: PricingConfig,
}

impl GreeksEngine {
    pub fn new(rate: f64, dividend_yield: f64, config: PricingConfig) -> Self {
        Self {
            rate,
            dividend_yield,
            config,
        }
    }

    /// Theoretical value at a given volatility
    pub fn fair_value(&self, side: OptionType, spot: f64, strike: f64, days_to_expiry: i64, vol: f64) -> f64 {
        bs_price(side, spot, strike, year_fraction(days_to_expiry), self.rate, self.dividend_yield, vol)
    }

    /// IV and Greeks for an observed premium. None when any input is
    /// non-positive or the IV does not resolve.
    pub fn evaluate(
        &self,
        side: OptionType,
        spot: f64,
        strike: f64,
        days_to_expiry: i64,
        premium: f64,
    ) -> Option<Greeks> {
        let time = year_fraction(days_to_expiry);

        let Some(iv) = implied_volatility(
            side,
            spot,
            strike,
            time,
            self.rate,
            self.dividend_yield,
            premium,
            &self.config,
        ) else {
            debug!("IV unresolved: {} K={} S={:.2} premium={:.2} dte={}",
                   side.as_str(), strike, spot, premium, days_to_expiry);
            return None;
        };

        Some(greeks(side, spot, strike, time, self.rate, self.dividend_yield, iv))
    }
}
