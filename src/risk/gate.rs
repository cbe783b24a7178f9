/// Greeks gate: confirms or demotes the TA trade type per candidate
use serde::{Deserialize, Serialize};

use crate::pricing::Greeks;
use crate::types::{GateConfig, MissingGreeksPolicy, OptionType, TradeType};

/// Outcome of gating one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub final_type: TradeType,
    pub rationale: String,
    pub passed: bool,
}

/// |theta| per day as a percentage of premium
pub fn theta_pct(theta: f64, premium: f64) -> f64 {
    if premium <= 0.0 {
        return f64::INFINITY;
    }
    theta.abs() / premium * 100.0
}

/// Apply the Greeks thresholds on top of `base`. Shorts are never upgraded.
pub fn resolve_trade_type(
    side: OptionType,
    base: TradeType,
    premium: f64,
    greeks: Option<&Greeks>,
    config: &GateConfig,
) -> GateDecision {
    let Some(g) = greeks else {
        return match config.missing_greeks {
            MissingGreeksPolicy::PassThrough => GateDecision {
                final_type: base,
                rationale: format!("Greeks missing, {} kept unchecked", base.as_str()),
                passed: false,
            },
            MissingGreeksPolicy::DemoteToShort => GateDecision {
                final_type: TradeType::Short,
                rationale: "Greeks missing, demoted to SHORT".to_string(),
                passed: false,
            },
        };
    };

    match base {
        TradeType::Long => gate_long(side, premium, g, config),
        TradeType::Short => gate_short(g, config),
    }
}

fn gate_long(side: OptionType, premium: f64, g: &Greeks, config: &GateConfig) -> GateDecision {
    let mut failures = Vec::new();

    if g.implied_vol < config.long_iv_min || g.implied_vol > config.long_iv_max {
        failures.push(format!(
            "IV {:.1}% outside {:.1}-{:.1}%",
            g.implied_vol * 100.0,
            config.long_iv_min * 100.0,
            config.long_iv_max * 100.0
        ));
    }

    let (delta_min, delta_max) = match side {
        OptionType::CE => (config.call_delta_min, config.call_delta_max),
        OptionType::PE => (config.put_delta_min, config.put_delta_max),
    };
    let delta = g.delta.abs();
    if delta < delta_min || delta > delta_max {
        failures.push(format!("|delta| {:.2} outside {:.2}-{:.2}", delta, delta_min, delta_max));
    }

    if g.gamma >= config.gamma_max {
        failures.push(format!("gamma {:.4} >= {:.4}", g.gamma, config.gamma_max));
    }

    let decay = theta_pct(g.theta, premium);
    if decay >= config.theta_pct_max {
        failures.push(format!("theta {:.2}%/day >= {:.2}%", decay, config.theta_pct_max));
    }

    if failures.is_empty() {
        GateDecision {
            final_type: TradeType::Long,
            rationale: format!(
                "LONG gates passed (IV {:.1}%, delta {:.2}, theta {:.2}%/day)",
                g.implied_vol * 100.0,
                g.delta,
                decay
            ),
            passed: true,
        }
    } else {
        GateDecision {
            final_type: TradeType::Short,
            rationale: format!("demoted to SHORT: {}", failures.join("; ")),
            passed: false,
        }
    }
}

fn gate_short(g: &Greeks, config: &GateConfig) -> GateDecision {
    let mut failures = Vec::new();

    if g.implied_vol < config.short_iv_min {
        failures.push(format!(
            "IV {:.1}% < {:.1}%",
            g.implied_vol * 100.0,
            config.short_iv_min * 100.0
        ));
    }
    if g.gamma >= config.gamma_max {
        failures.push(format!("gamma {:.4} >= {:.4}", g.gamma, config.gamma_max));
    }

    if failures.is_empty() {
        GateDecision {
            final_type: TradeType::Short,
            rationale: format!("SHORT gates passed (IV {:.1}%)", g.implied_vol * 100.0),
            passed: true,
        }
    } else {
        GateDecision {
            final_type: TradeType::Short,
            rationale: format!("weak SHORT: {}", failures.join("; ")),
            passed: false,
        }
    }
}
