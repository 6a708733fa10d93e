//! fbot-decision — C4 decision engine.
//!
//! `decide(input) -> Decision` implementing the ten-stage hierarchy: kill
//! switch, constitution, quality gates, session gate, capital tier, per
//! template EUC scoring, template selection, stop sizing, position sizing,
//! `OrderIntent` emission. Templates K1..K4 are a closed sum type dispatched
//! through `templates::spec_for`/`side_for` rather than a trait object.

mod euc;
mod templates;
mod types;

#[cfg(test)]
mod tests_support;

pub use euc::{EucScore, EucThresholds};
pub use templates::{spec_for, TemplateSpec};
pub use types::{
    capital_tier, templates_allowed_for_tier, Decision, LearningLookup, MarketContext,
    OrderIntent, Regime, ReliabilityKey, RiskSnapshot, TimeOfDayBucket,
};

use fbot_beliefs::BeliefState;
use fbot_schemas::{Micros, ReasonCode, TemplateId};
use fbot_signals::SignalVector;

/// Fixed constitutional ceiling on stop distance regardless of tier or
/// template; only the risk engine's own config can be tighter.
const CONSTITUTIONAL_MAX_STOP_TICKS: u32 = 12;

fn tier_max_stop_ticks(tier: fbot_schemas::CapitalTier) -> u32 {
    match tier {
        fbot_schemas::CapitalTier::S => 6,
        fbot_schemas::CapitalTier::A => 8,
        fbot_schemas::CapitalTier::B => 12,
    }
}

pub struct DecisionInput<'a> {
    pub equity_usd: f64,
    pub last_close: Micros,
    pub beliefs: &'a BeliefState,
    pub signals: &'a SignalVector,
    pub risk: RiskSnapshot,
    pub learning: &'a dyn LearningLookup,
    pub execution_enabled: bool,
    pub days_to_expiry: u32,
    pub max_risk_usd_per_trade: f64,
    pub tick_value_usd: f64,
}

fn market_context(input: &DecisionInput, dvs: f64, eqs: f64) -> MarketContext {
    MarketContext {
        session_open: input.signals.session_phase.is_trade_seeking_eligible(),
        execution_enabled: input.execution_enabled,
        dvs,
        eqs,
        days_to_expiry: input.days_to_expiry,
        kill_switch_state: input.risk.kill_switch_on,
    }
}

/// `decide` takes the current-bar data-quality scores directly (rather than
/// folding them into `DecisionInput`) since both the belief engine and this
/// crate read them independently at the same cadence.
pub fn decide(input: &DecisionInput, dvs: f64, eqs: f64) -> Decision {
    let ctx = market_context(input, dvs, eqs);

    // 1. kill switch.
    if input.risk.kill_switch_on {
        return Decision::NoTrade(ReasonCode::KillSwitchActive);
    }

    // 2. constitution.
    if input.risk.daily_loss_breached {
        return Decision::NoTrade(ReasonCode::DailyLossLimitBreached);
    }
    if input.risk.trades_per_day_breached {
        return Decision::NoTrade(ReasonCode::TradesPerDayLimitBreached);
    }
    if input.risk.consecutive_losses_breached {
        return Decision::NoTrade(ReasonCode::ConsecutiveLossLimitBreached);
    }

    // 3. quality gates.
    if dvs < 0.80 {
        return Decision::NoTrade(ReasonCode::DvsGateFailed);
    }
    if eqs < 0.75 {
        return Decision::NoTrade(ReasonCode::EqsGateFailed);
    }

    // 4. session.
    if !input.signals.session_phase.is_trade_seeking_eligible() {
        return Decision::NoTrade(ReasonCode::SessionClosed);
    }

    // 5. capital tier.
    let tier = match capital_tier(input.equity_usd) {
        Some(t) => t,
        None => return Decision::NoTrade(ReasonCode::EquityTooLow),
    };
    let allowed = templates_allowed_for_tier(tier);

    // 6-7. score every tier-allowed, detected template and pick the best.
    let regime = Regime::from_volatility_score(input.signals.volatility_regime_score);
    let tod = TimeOfDayBucket::from_session_phase(input.signals.session_phase);
    let thresholds = EucThresholds::default();

    let mut best: Option<(TemplateId, EucScore)> = None;

    for &id in allowed {
        let spec = spec_for(id);
        let belief = input.beliefs.get(spec.thesis_constraint);
        if belief.effective < 0.50 {
            continue;
        }
        if templates::side_for(id, input.signals).is_none() {
            continue;
        }

        let key = ReliabilityKey { template: id, regime, tod };
        let win_rate_lb = input.learning.win_rate_lower_bound(key);
        let cost_multiplier = input.learning.euc_cost_multiplier(key);
        if !cost_multiplier.is_finite() {
            continue; // quarantined
        }

        let score = euc::score(&spec, input.signals, &belief, dvs, eqs, win_rate_lb, cost_multiplier);
        if !thresholds.accepts(&score) {
            continue;
        }

        if best.map(|(_, b)| score.euc > b.euc).unwrap_or(true) {
            best = Some((id, score));
        }
    }

    let (template_id, score) = match best {
        Some(x) => x,
        None => return Decision::NoTrade(ReasonCode::EucRejected),
    };

    let spec = spec_for(template_id);
    let side = match templates::side_for(template_id, input.signals) {
        Some(s) => s,
        None => return Decision::NoTrade(ReasonCode::EucRejected),
    };

    // 8. stop distance.
    let risk_floor_stop_ticks = if input.tick_value_usd > 0.0 {
        (input.max_risk_usd_per_trade / input.tick_value_usd).floor() as u32
    } else {
        0
    };
    let stop_ticks = CONSTITUTIONAL_MAX_STOP_TICKS
        .min(tier_max_stop_ticks(tier))
        .min(spec.stop_ticks_max)
        .min(risk_floor_stop_ticks);
    if stop_ticks < spec.stop_ticks_min {
        return Decision::NoTrade(ReasonCode::StopTooTightOrWide);
    }

    // 9. position size.
    let per_contract_risk_usd = stop_ticks as f64 * input.tick_value_usd;
    let risk_budget_usd = input.max_risk_usd_per_trade.min(0.02 * input.equity_usd);
    let size = if per_contract_risk_usd > 0.0 {
        (risk_budget_usd / per_contract_risk_usd).floor() as u32
    } else {
        0
    };
    if size == 0 {
        return Decision::NoTrade(ReasonCode::SizeZero);
    }

    // 10. emit.
    Decision::Enter(OrderIntent {
        template_id,
        side,
        entry_limit: input.last_close,
        stop_ticks,
        target_ticks: spec.target_ticks,
        size,
        euc_score: score.euc,
        market_context: ctx,
        regime,
        tod,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_schemas::{CapitalTier, ConstraintId, Side};

    struct FixedLearning {
        win_rate_lb: f64,
        cost_multiplier: f64,
    }

    impl LearningLookup for FixedLearning {
        fn win_rate_lower_bound(&self, _key: ReliabilityKey) -> f64 {
            self.win_rate_lb
        }
        fn euc_cost_multiplier(&self, _key: ReliabilityKey) -> f64 {
            self.cost_multiplier
        }
    }

    fn strong_beliefs(signals: &SignalVector) -> BeliefState {
        fbot_beliefs::update(&BeliefState::initial(), signals, 0.95, 0.90)
    }

    fn base_input<'a>(
        beliefs: &'a BeliefState,
        signals: &'a SignalVector,
        learning: &'a FixedLearning,
    ) -> DecisionInput<'a> {
        DecisionInput {
            equity_usd: 5_000.0,
            last_close: Micros::from_dollars(5_000.0),
            beliefs,
            signals,
            risk: RiskSnapshot {
                kill_switch_on: false,
                daily_loss_breached: false,
                trades_per_day_breached: false,
                consecutive_losses_breached: false,
            },
            learning,
            execution_enabled: true,
            days_to_expiry: 20,
            max_risk_usd_per_trade: 100.0,
            tick_value_usd: 1.25,
        }
    }

    #[test]
    fn kill_switch_short_circuits_everything() {
        let signals = tests_support::sample_signals();
        let beliefs = strong_beliefs(&signals);
        let learning = FixedLearning { win_rate_lb: 0.7, cost_multiplier: 1.0 };
        let mut input = base_input(&beliefs, &signals, &learning);
        input.risk.kill_switch_on = true;
        let d = decide(&input, 0.95, 0.90);
        assert_eq!(d, Decision::NoTrade(ReasonCode::KillSwitchActive));
    }

    #[test]
    fn low_dvs_rejects_before_template_scoring() {
        let signals = tests_support::sample_signals();
        let beliefs = strong_beliefs(&signals);
        let learning = FixedLearning { win_rate_lb: 0.7, cost_multiplier: 1.0 };
        let input = base_input(&beliefs, &signals, &learning);
        let d = decide(&input, 0.50, 0.90);
        assert_eq!(d, Decision::NoTrade(ReasonCode::DvsGateFailed));
    }

    #[test]
    fn equity_below_floor_is_too_low() {
        let signals = tests_support::sample_signals();
        let beliefs = strong_beliefs(&signals);
        let learning = FixedLearning { win_rate_lb: 0.7, cost_multiplier: 1.0 };
        let mut input = base_input(&beliefs, &signals, &learning);
        input.equity_usd = 1_000.0;
        let d = decide(&input, 0.95, 0.90);
        assert_eq!(d, Decision::NoTrade(ReasonCode::EquityTooLow));
    }

    #[test]
    fn quarantined_template_is_skipped() {
        let signals = tests_support::sample_signals();
        let beliefs = strong_beliefs(&signals);
        let learning = FixedLearning { win_rate_lb: 0.7, cost_multiplier: f64::INFINITY };
        let input = base_input(&beliefs, &signals, &learning);
        let d = decide(&input, 0.95, 0.90);
        assert_eq!(d, Decision::NoTrade(ReasonCode::EucRejected));
    }

    #[test]
    fn strong_momentum_with_good_learning_stats_enters() {
        let signals = tests_support::sample_signals();
        let beliefs = strong_beliefs(&signals);
        let learning = FixedLearning { win_rate_lb: 0.65, cost_multiplier: 1.0 };
        let input = base_input(&beliefs, &signals, &learning);
        match decide(&input, 0.97, 0.92) {
            Decision::Enter(intent) => {
                assert_eq!(intent.template_id, TemplateId::K1);
                assert_eq!(intent.side, Side::Buy);
                assert!(intent.size > 0);
                assert!(intent.stop_ticks >= 1);
            }
            other => panic!("expected an entry, got {other:?}"),
        }
    }

    #[test]
    fn capital_tier_bands_match_thresholds() {
        assert_eq!(capital_tier(1_000.0), None);
        assert_eq!(capital_tier(1_500.0), Some(CapitalTier::S));
        assert_eq!(capital_tier(2_500.0), Some(CapitalTier::A));
        assert_eq!(capital_tier(7_500.0), Some(CapitalTier::B));
    }

    #[test]
    fn tier_s_excludes_k4() {
        assert!(!templates_allowed_for_tier(CapitalTier::S).contains(&TemplateId::K4));
        assert!(templates_allowed_for_tier(CapitalTier::B).contains(&TemplateId::K4));
    }

    #[test]
    fn thesis_constraint_matches_template() {
        assert_eq!(spec_for(TemplateId::K2).thesis_constraint, ConstraintId::F2);
    }
}
