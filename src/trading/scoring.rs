/// Scoring, lot sizing, exit levels and ranking of gated candidates
use serde::{Deserialize, Serialize};

use crate::trading::candidate::Candidate;
use crate::types::{ExitPolicy, ScoringConfig, Side, TradeType};
use crate::utils::round_to_tick;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPick {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub score: f64,
    pub suggested_lots: u32,
    pub capital_required: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub entry_action: Side,
    pub exit_action: Side,
}

/// LONG lots that fit the budget and their capital. SHORT is never sized.
pub fn size_position(trade: TradeType, premium: f64, lot_size: u32, budget: f64) -> (u32, f64) {
    let lot_cost = premium * lot_size as f64;
    if trade == TradeType::Short || lot_cost <= 0.0 || budget <= 0.0 {
        return (0, 0.0);
    }

    let mut lots = (budget / lot_cost).floor() as u32;
    while lots > 0 && lots as f64 * lot_cost > budget {
        lots -= 1;
    }
    (lots, lots as f64 * lot_cost)
}

/// (take_profit, stop_loss) tick-rounded and floored at one tick
pub fn exit_levels(policy: &ExitPolicy, trade: TradeType, premium: f64, tick: f64) -> (f64, f64) {
    let (target, stop) = match *policy {
        ExitPolicy::Percent { target, stop } => (target, stop),
        ExitPolicy::Multiple { target, stop } => (target - 1.0, 1.0 - stop),
    };

    let (tp, sl) = match trade {
        TradeType::Long => (premium * (1.0 + target), premium * (1.0 - stop)),
        TradeType::Short => (premium * (1.0 - target), premium * (1.0 + stop)),
    };

    let floor = tick.max(0.0);
    (round_to_tick(tp, tick).max(floor), round_to_tick(sl, tick).max(floor))
}

pub struct ScoringEngine {
    weights: ScoringConfig,
    exits: ExitPolicy,
    default_tick: f64,
}

impl ScoringEngine {
    pub fn new(weights: ScoringConfig, exits: ExitPolicy, default_tick: f64) -> Self {
        Self {
            weights,
            exits,
            default_tick,
        }
    }

    /// Liquidity and affordability raise the score, relative spread lowers it
    pub fn score(&self, candidate: &Candidate, budget: f64) -> f64 {
        let w = &self.weights;
        let volume = candidate.quote.volume.unwrap_or(0) as f64;
        let rel_spread = candidate
            .quote
            .spread()
            .map(|s| s / candidate.premium)
            .unwrap_or(w.spread_fallback);
        let lot_cost = candidate.premium * candidate.instrument.lot_size as f64;
        let affordable = candidate.final_type == TradeType::Long && lot_cost <= budget;

        let mut score = w.volume_weight * volume.ln_1p() - w.spread_weight * rel_spread;
        if affordable {
            score += w.affordability_weight;
        }
        if candidate.aligned {
            score += w.alignment_bonus;
        }
        score
    }

    pub fn build_pick(&self, candidate: Candidate, budget: f64) -> ScoredPick {
        let trade = candidate.final_type;
        let tick = if candidate.instrument.tick_size > 0.0 {
            candidate.instrument.tick_size
        } else {
            self.default_tick
        };

        let score = self.score(&candidate, budget);
        let (lots, capital) = size_position(trade, candidate.premium, candidate.instrument.lot_size, budget);
        let (take_profit, stop_loss) = exit_levels(&self.exits, trade, candidate.premium, tick);
        let entry = trade.entry_action();

        ScoredPick {
            candidate,
            score,
            suggested_lots: lots,
            capital_required: capital,
            take_profit,
            stop_loss,
            entry_action: entry,
            exit_action: entry.opposite(),
        }
    }
}

/// Descending by score, ties by tradingsymbol, truncated to `max_picks`
pub fn rank(mut picks: Vec<ScoredPick>, max_picks: usize) -> Vec<ScoredPick> {
    picks.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.candidate.instrument.tradingsymbol.cmp(&b.candidate.instrument.tradingsymbol))
    });
    picks.truncate(max_picks);
    picks
}
