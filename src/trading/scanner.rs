/// Scan orchestrator: one point-in-time pass from instruments to ranked picks
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::{fetch_quotes, InstrumentCache, MarketDataProvider, QuoteBatchPolicy};
use crate::error::{CandidateSkip, ScanError};
use crate::pricing::GreeksEngine;
use crate::strategy::{assess_zone_status, Bias, BiasResolver, ZoneLocation, ZoneSignal};
use crate::trading::candidate::{build_candidate, CandidateContext};
use crate::trading::scoring::{rank, ScoredPick, ScoringEngine};
use crate::trading::universe::{filter_universe, UnderlyingUniverse, UniverseResolver};
use crate::types::{Candle, Config, Quote, Timeframe, TradeType, UnderlyingSpec};
use crate::utils::{days_to_expiry, exchange_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Ok,
    Degraded,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDiagnostics {
    pub underlyings_requested: usize,
    pub instruments_loaded: usize,
    pub instruments_in_universe: usize,
    pub candidates_built: usize,
    pub symbols_quoted: usize,
    pub quotes_missing: usize,
    pub iv_unresolved: usize,
    pub gated_long: usize,
    pub gated_short: usize,
    pub demoted: usize,
    pub picks_before_truncation: usize,
    pub picks_returned: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub status: ScanStatus,
    pub scan_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub budget: f64,
    pub picks: Vec<ScoredPick>,
    pub errors: Vec<String>,
    pub diagnostics: ScanDiagnostics,
    pub biases: Vec<Bias>,
    pub zone_signals: Vec<ZoneSignal>,
}

/// Everything the candidate stage needs about one underlying
struct UnderlyingPlan {
    bias: Bias,
    zone: ZoneLocation,
    universe: UnderlyingUniverse,
}

/// Collects state while a scan runs
struct ScanRun {
    scan_id: Uuid,
    timestamp: DateTime<Utc>,
    budget: f64,
    errors: Vec<String>,
    diagnostics: ScanDiagnostics,
    biases: Vec<Bias>,
    zone_signals: Vec<ZoneSignal>,
}

impl ScanRun {
    fn non_fatal(&mut self, message: String) {
        warn!("⚠️ {}", message);
        self.errors.push(message);
    }

    fn fail(mut self, err: ScanError) -> ScanResult {
        error!("❌ Scan {} failed [{}]: {}", self.scan_id, err.error_code(), err);
        self.errors.push(err.to_string());
        self.finish(ScanStatus::Error, Vec::new())
    }

    fn finish(mut self, status: ScanStatus, picks: Vec<ScoredPick>) -> ScanResult {
        self.diagnostics.picks_returned = picks.len();
        ScanResult {
            status,
            scan_id: self.scan_id,
            timestamp: self.timestamp,
            budget: self.budget,
            picks,
            errors: self.errors,
            diagnostics: self.diagnostics,
            biases: self.biases,
            zone_signals: self.zone_signals,
        }
    }
}

pub struct Scanner {
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<InstrumentCache>,
    config: Arc<Config>,
    bias_resolver: BiasResolver,
    universe: UniverseResolver,
    engine: GreeksEngine,
    scoring: ScoringEngine,
    quote_policy: QuoteBatchPolicy,
}

impl Scanner {
    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: Arc<InstrumentCache>, config: Arc<Config>) -> Self {
        Scanner {
            bias_resolver: BiasResolver::new(config.bias.clone()),
            universe: UniverseResolver::new(config.universe.clone()),
            engine: GreeksEngine::new(config.risk_free_rate, config.dividend_yield, config.pricing.clone()),
            scoring: ScoringEngine::new(config.scoring.clone(), config.exits, config.tick_size),
            quote_policy: QuoteBatchPolicy::from_config(&config.quotes),
            provider,
            cache,
            config,
        }
    }

    /// Run a scan now. `budget` defaults to the configured one.
    pub async fn scan(&self, budget: Option<f64>) -> ScanResult {
        self.scan_at(budget, Utc::now()).await
    }

    /// Run a scan as of `now`
    pub async fn scan_at(&self, budget: Option<f64>, now: DateTime<Utc>) -> ScanResult {
        let budget = budget.unwrap_or(self.config.default_budget);
        let mut run = ScanRun {
            scan_id: Uuid::new_v4(),
            timestamp: now,
            budget,
            errors: Vec::new(),
            diagnostics: ScanDiagnostics {
                underlyings_requested: self.config.underlyings.len(),
                ..Default::default()
            },
            biases: Vec::new(),
            zone_signals: Vec::new(),
        };

        info!("🔍 Scan {} started (budget ₹{:.0}, {} underlyings)",
              run.scan_id, budget, self.config.underlyings.len());

        if budget <= 0.0 || !budget.is_finite() {
            return run.fail(ScanError::InvalidParameter(format!("budget must be positive, got {}", budget)));
        }

        // Instruments
        let instruments = match self.cache.get_or_load(self.provider.as_ref(), &self.config.exchange_segment).await {
            Ok(instruments) => instruments,
            Err(e) => return run.fail(e),
        };
        run.diagnostics.instruments_loaded = instruments.len();

        let names: Vec<String> = self.config.underlyings.iter().map(|u| u.name.clone()).collect();
        let universe = match filter_universe(&instruments, &names) {
            Ok(universe) => universe,
            Err(e) => return run.fail(e),
        };
        run.diagnostics.instruments_in_universe = universe.len();

        // Spot references
        let spot_symbols: Vec<String> = self.config.underlyings.iter().map(|u| u.spot_symbol.clone()).collect();
        let spot_fetch = fetch_quotes(self.provider.as_ref(), &spot_symbols, &self.quote_policy).await;
        for message in spot_fetch.errors {
            run.non_fatal(format!("spot {}", message));
        }

        // Per-underlying TA and universe
        let today = exchange_date(now);
        let mut plans = Vec::new();
        for spec in &self.config.underlyings {
            let bias = self.resolve_bias(spec, now, &mut run).await;
            let zone = self.resolve_zone(spec, now, &mut run).await;

            let reference = spot_fetch
                .quotes
                .get(&spec.spot_symbol)
                .and_then(|q| q.last_price)
                .or(bias.close_price);

            match self.universe.resolve(&universe, &spec.name, bias.direction, reference, today) {
                Ok(resolved) => plans.push(UnderlyingPlan {
                    bias: bias.clone(),
                    zone,
                    universe: resolved,
                }),
                Err(e) => run.non_fatal(e.to_string()),
            }
            run.biases.push(bias);
        }

        if plans.is_empty() {
            return run.fail(ScanError::EmptyStrikeRing(
                "no underlying produced a tradable strike ring".to_string(),
            ));
        }

        // Quotes
        let symbols: Vec<String> = plans
            .iter()
            .flat_map(|p| p.universe.contracts.iter().map(|c| c.quote_key()))
            .collect();
        run.diagnostics.symbols_quoted = symbols.len();
        info!("📊 Fetching quotes for {} contracts", symbols.len());

        let fetch = fetch_quotes(self.provider.as_ref(), &symbols, &self.quote_policy).await;
        run.diagnostics.quotes_missing = symbols.len().saturating_sub(fetch.quotes.len());
        for message in fetch.errors {
            run.non_fatal(message);
        }

        // Candidates
        let mut picks = Vec::new();
        for plan in &plans {
            picks.extend(self.score_underlying(plan, &fetch.quotes, today, budget, &mut run));
        }

        run.diagnostics.picks_before_truncation = picks.len();
        let picks = rank(picks, self.config.max_picks);

        let status = if picks.is_empty() {
            run.non_fatal("no candidates survived quoting and gating".to_string());
            ScanStatus::Degraded
        } else if run.errors.is_empty() {
            ScanStatus::Ok
        } else {
            ScanStatus::Degraded
        };

        info!("✅ Scan {} {:?}: {} picks, {} non-fatal errors",
              run.scan_id, status, picks.len(), run.errors.len());
        run.finish(status, picks)
    }

    async fn resolve_bias(&self, spec: &UnderlyingSpec, now: DateTime<Utc>, run: &mut ScanRun) -> Bias {
        let from = now - Duration::days(self.config.bias.lookback_days);
        let candles = self.candles(spec, from, now, Timeframe::Daily, run).await;
        self.bias_resolver.resolve(&spec.name, &candles)
    }

    async fn resolve_zone(&self, spec: &UnderlyingSpec, now: DateTime<Utc>, run: &mut ScanRun) -> ZoneLocation {
        let zones = &self.config.zones;
        let from = now - Duration::days(zones.lookback_days);
        let candles = self.candles(spec, from, now, zones.timeframe, run).await;

        match assess_zone_status(&spec.name, &candles, zones) {
            Some(signal) => {
                let location = signal.status;
                run.zone_signals.push(signal);
                location
            }
            None => {
                debug!("{}: {} zone candles, below {}", spec.name, candles.len(), zones.min_candles);
                ZoneLocation::Outside
            }
        }
    }

    /// Candles for the spot token; failures and empty series are non-fatal
    async fn candles(
        &self,
        spec: &UnderlyingSpec,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        timeframe: Timeframe,
        run: &mut ScanRun,
    ) -> Vec<Candle> {
        match self.provider.historical_candles(&spec.spot_token, from, to, timeframe).await {
            Ok(candles) if candles.is_empty() => {
                run.non_fatal(format!("{}: no {} candles", spec.name, timeframe.as_str()));
                candles
            }
            Ok(candles) => candles,
            Err(e) => {
                run.non_fatal(format!("{}: {} candles failed: {}", spec.name, timeframe.as_str(), e));
                Vec::new()
            }
        }
    }

    fn score_underlying(
        &self,
        plan: &UnderlyingPlan,
        quotes: &HashMap<String, Quote>,
        today: NaiveDate,
        budget: f64,
        run: &mut ScanRun,
    ) -> Vec<ScoredPick> {
        let dte = days_to_expiry(plan.universe.expiry, today);
        let mut picks = Vec::new();

        for instrument in &plan.universe.contracts {
            let side = instrument.option_type;
            let (base_type, base_reason) = self.bias_resolver.base_trade_type(&plan.bias, side, plan.zone);
            let ctx = CandidateContext {
                spot: plan.universe.reference_price,
                days_to_expiry: dte,
                base_type,
                base_reason: &base_reason,
                aligned: plan.bias.direction.aligns_with(side),
            };

            let candidate = match build_candidate(
                instrument,
                quotes.get(&instrument.quote_key()),
                &ctx,
                &self.engine,
                &self.config.gates,
            ) {
                Ok(candidate) => candidate,
                // Already reported by the quote fetch
                Err(CandidateSkip::NoQuote(symbol)) => {
                    debug!("{}: skipped, no quote", symbol);
                    continue;
                }
                Err(skip) => {
                    run.non_fatal(skip.to_string());
                    continue;
                }
            };

            run.diagnostics.candidates_built += 1;
            if candidate.greeks.is_none() {
                run.diagnostics.iv_unresolved += 1;
                run.non_fatal(format!("{}: implied volatility unresolved", instrument.quote_key()));
            }
            match candidate.final_type {
                TradeType::Long => run.diagnostics.gated_long += 1,
                TradeType::Short => run.diagnostics.gated_short += 1,
            }
            if candidate.base_type == TradeType::Long && candidate.final_type == TradeType::Short {
                run.diagnostics.demoted += 1;
            }

            picks.push(self.scoring.build_pick(candidate, budget));
        }
        picks
    }
}
