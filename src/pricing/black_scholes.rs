//! Black-Scholes Model
//!
//! Provides:
//! - European option pricing with continuous dividend/carry yield
//! - Closed-form Greeks
//! - Implied volatility solver (bisection with bracket expansion)
//!
//! Conventions: theta is per calendar day, vega per vol point (1%), rho per
//! rate point (1%). Time is a year fraction.

use std::f64::consts::{PI, SQRT_2};

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::types::{OptionType, PricingConfig};

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal PDF
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Black-Scholes d1 parameter
pub fn d1(spot: f64, strike: f64, time: f64, rate: f64, div: f64, vol: f64) -> f64 {
    ((spot / strike).ln() + (rate - div + 0.5 * vol * vol) * time) / (vol * time.sqrt())
}

/// Black-Scholes d2 parameter
pub fn d2(spot: f64, strike: f64, time: f64, rate: f64, div: f64, vol: f64) -> f64 {
    d1(spot, strike, time, rate, div, vol) - vol * time.sqrt()
}

/// Black-Scholes European option price
pub fn bs_price(
    side: OptionType,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    div: f64,
    vol: f64,
) -> f64 {
    let df = (-rate * time).exp();
    let div_factor = (-div * time).exp();

    if time <= 0.0 || vol <= 0.0 {
        // Discounted intrinsic on the forward
        let forward_value = spot * div_factor;
        let pv_strike = strike * df;
        return match side {
            OptionType::CE => (forward_value - pv_strike).max(0.0),
            OptionType::PE => (pv_strike - forward_value).max(0.0),
        };
    }

    let d1 = d1(spot, strike, time, rate, div, vol);
    let d2 = d1 - vol * time.sqrt();

    match side {
        OptionType::CE => spot * div_factor * norm_cdf(d1) - strike * df * norm_cdf(d2),
        OptionType::PE => strike * df * norm_cdf(-d2) - spot * div_factor * norm_cdf(-d1),
    }
}

/// Sensitivities at a solved implied volatility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Annualized implied volatility
    pub implied_vol: f64,
    pub delta: f64,
    pub gamma: f64,
    /// Per calendar day
    pub theta: f64,
    /// Per vol point
    pub vega: f64,
    /// Per rate point
    pub rho: f64,
}

/// Closed-form Greeks at volatility `vol`
pub fn greeks(
    side: OptionType,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    div: f64,
    vol: f64,
) -> Greeks {
    let d1 = d1(spot, strike, time, rate, div, vol);
    let d2 = d1 - vol * time.sqrt();
    let df = (-rate * time).exp();
    let div_factor = (-div * time).exp();
    let sqrt_t = time.sqrt();
    let pdf_d1 = norm_pdf(d1);

    let delta = match side {
        OptionType::CE => div_factor * norm_cdf(d1),
        OptionType::PE => div_factor * (norm_cdf(d1) - 1.0),
    };

    // Gamma and vega are the same for call and put
    let gamma = div_factor * pdf_d1 / (spot * vol * sqrt_t);
    let vega = spot * div_factor * pdf_d1 * sqrt_t / 100.0;

    let decay = -spot * div_factor * pdf_d1 * vol / (2.0 * sqrt_t);
    let theta = match side {
        OptionType::CE => {
            decay - rate * strike * df * norm_cdf(d2) + div * spot * div_factor * norm_cdf(d1)
        }
        OptionType::PE => {
            decay + rate * strike * df * norm_cdf(-d2) - div * spot * div_factor * norm_cdf(-d1)
        }
    };

    let rho = match side {
        OptionType::CE => strike * time * df * norm_cdf(d2) / 100.0,
        OptionType::PE => -strike * time * df * norm_cdf(-d2) / 100.0,
    };

    Greeks {
        implied_vol: vol,
        delta,
        gamma,
        theta: theta / 365.0,
        vega,
        rho,
    }
}

/// Bisection search for the volatility that reproduces `observed`.
/// None when the bracket cannot straddle the observed price.
pub fn implied_volatility(
    side: OptionType,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    div: f64,
    observed: f64,
    config: &PricingConfig,
) -> Option<f64> {
    let inputs = [spot, strike, time, observed];
    if inputs.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return None;
    }

    let tol = config.price_tolerance;
    let price_at = |vol: f64| bs_price(side, spot, strike, time, rate, div, vol);

    let mut low = config.iv_lower;
    let mut high = config.iv_upper;

    // Below the near-zero-vol price nothing can match
    if price_at(low) - observed > tol {
        return None;
    }

    let mut expansions = 0;
    while price_at(high) - observed < -tol {
        if expansions >= config.max_bracket_expansions {
            return None;
        }
        low = high;
        high *= 2.0;
        expansions += 1;
    }

    for _ in 0..config.max_iterations {
        let mid = 0.5 * (low + high);
        let diff = price_at(mid) - observed;

        if diff.abs() < tol {
            return Some(mid);
        }

        if diff > 0.0 {
            high = mid;
        } else {
            low = mid;
        }
    }

    Some(0.5 * (low + high))
}
