/// Per-symbol candidate assembly: quote, Greeks and trade-type gating
use serde::{Deserialize, Serialize};

use crate::error::CandidateSkip;
use crate::pricing::{GreeksEngine, Greeks};
use crate::risk::resolve_trade_type;
use crate::types::{GateConfig, Instrument, Quote, TradeType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub instrument: Instrument,
    pub quote: Quote,
    /// Validated last traded price
    pub premium: f64,
    pub spot: f64,
    pub days_to_expiry: i64,
    pub greeks: Option<Greeks>,
    pub base_type: TradeType,
    pub final_type: TradeType,
    pub gate_passed: bool,
    pub rationale: String,
    /// Option side agrees with the underlying's directional bias
    pub aligned: bool,
}

/// TA inputs shared by every contract of one underlying
#[derive(Debug, Clone, Copy)]
pub struct CandidateContext<'a> {
    pub spot: Option<f64>,
    pub days_to_expiry: i64,
    pub base_type: TradeType,
    pub base_reason: &'a str,
    pub aligned: bool,
}

/// Build one candidate. Unresolved IV still yields a candidate with
/// `greeks: None`; the gate's missing-Greeks policy decides its type.
pub fn build_candidate(
    instrument: &Instrument,
    quote: Option<&Quote>,
    ctx: &CandidateContext<'_>,
    engine: &GreeksEngine,
    gates: &GateConfig,
) -> Result<Candidate, CandidateSkip> {
    let symbol = instrument.quote_key();
    let quote = quote.ok_or_else(|| CandidateSkip::NoQuote(symbol.clone()))?;
    let premium = quote
        .last_price
        .ok_or_else(|| CandidateSkip::NoLastPrice(symbol.clone()))?;
    if premium <= 0.0 || !premium.is_finite() {
        return Err(CandidateSkip::NonPositivePremium { symbol, premium });
    }
    let spot = ctx.spot.ok_or(CandidateSkip::NoSpotReference(symbol))?;

    let greeks = engine.evaluate(
        instrument.option_type,
        spot,
        instrument.strike,
        ctx.days_to_expiry,
        premium,
    );
    let decision = resolve_trade_type(
        instrument.option_type,
        ctx.base_type,
        premium,
        greeks.as_ref(),
        gates,
    );

    Ok(Candidate {
        instrument: instrument.clone(),
        quote: quote.clone(),
        premium,
        spot,
        days_to_expiry: ctx.days_to_expiry,
        greeks,
        base_type: ctx.base_type,
        final_type: decision.final_type,
        gate_passed: decision.passed,
        rationale: format!("{}; {}", ctx.base_reason, decision.rationale),
        aligned: ctx.aligned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::{option, quote};
    use crate::types::{MissingGreeksPolicy, OptionType, PricingConfig};

    fn engine() -> GreeksEngine {
        GreeksEngine::new(0.065, 0.0, PricingConfig::default())
    }

    fn ctx(spot: Option<f64>) -> CandidateContext<'static> {
        CandidateContext {
            spot,
            days_to_expiry: 7,
            base_type: TradeType::Long,
            base_reason: "BULLISH trend confirmed",
            aligned: true,
        }
    }

    #[test]
    fn test_priced_candidate() {
        let inst = option("NIFTY", OptionType::CE, 25_000.0, 7);
        let premium = engine().fair_value(OptionType::CE, 25_000.0, 25_000.0, 7, 0.15);
        let q = quote(premium, 10_000);

        let c = build_candidate(&inst, Some(&q), &ctx(Some(25_000.0)), &engine(), &GateConfig::default()).unwrap();
        let g = c.greeks.unwrap();
        assert!((g.implied_vol - 0.15).abs() < 1e-3);
        assert_eq!(c.final_type, TradeType::Long);
        assert!(c.rationale.starts_with("BULLISH trend confirmed; LONG gates passed"));
    }

    #[test]
    fn test_skips() {
        let inst = option("NIFTY", OptionType::PE, 25_000.0, 7);
        let key = inst.quote_key();
        let gates = GateConfig::default();

        assert_eq!(
            build_candidate(&inst, None, &ctx(Some(25_000.0)), &engine(), &gates).unwrap_err(),
            CandidateSkip::NoQuote(key.clone())
        );
        let no_ltp = Quote::default();
        assert_eq!(
            build_candidate(&inst, Some(&no_ltp), &ctx(Some(25_000.0)), &engine(), &gates).unwrap_err(),
            CandidateSkip::NoLastPrice(key.clone())
        );
        assert!(matches!(
            build_candidate(&inst, Some(&quote(-1.0, 5)), &ctx(Some(25_000.0)), &engine(), &gates),
            Err(CandidateSkip::NonPositivePremium { .. })
        ));
        assert_eq!(
            build_candidate(&inst, Some(&quote(100.0, 5)), &ctx(None), &engine(), &gates).unwrap_err(),
            CandidateSkip::NoSpotReference(key)
        );
    }

    #[test]
    fn test_unresolved_iv_applies_policy() {
        // Premium below intrinsic value cannot be matched by any volatility
        let inst = option("NIFTY", OptionType::CE, 24_000.0, 7);
        let q = quote(500.0, 100);
        let mut gates = GateConfig::default();
        gates.missing_greeks = MissingGreeksPolicy::DemoteToShort;

        let c = build_candidate(&inst, Some(&q), &ctx(Some(25_000.0)), &engine(), &gates).unwrap();
        assert!(c.greeks.is_none());
        assert_eq!(c.final_type, TradeType::Short);
        assert!(c.rationale.contains("Greeks missing"));
    }
}
