//! fbot-learning — C7 learning loop.
//!
//! Per-`(template, regime, tod)` reliability tracking with a four-state
//! throttle machine (ACTIVE/THROTTLED_MILD/THROTTLED_HEAVY/QUARANTINED).
//! Implements `fbot_decision::LearningLookup` so the decision engine can
//! read win-rate and cost-multiplier estimates without depending on this
//! crate's storage.

mod types;

pub use types::{LearningUpdate, ReliabilityMetrics, ReliabilityState, TriggerReason};

use std::collections::HashMap;

use fbot_decision::{LearningLookup, ReliabilityKey};
use fbot_trademgr::TradeOutcome;
use serde::{Deserialize, Serialize};

/// Persist state to disk after this many newly recorded outcomes.
pub const PERSIST_EVERY_N_OUTCOMES: u32 = 10;

#[derive(Serialize, Deserialize)]
struct PersistedState {
    entries: Vec<(PersistedKey, ReliabilityMetrics)>,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
struct PersistedKey {
    template: u8,
    regime: u8,
    tod: u8,
}

fn encode_key(k: ReliabilityKey) -> PersistedKey {
    use fbot_decision::{Regime, TimeOfDayBucket};
    use fbot_schemas::TemplateId;
    PersistedKey {
        template: match k.template {
            TemplateId::K1 => 0,
            TemplateId::K2 => 1,
            TemplateId::K3 => 2,
            TemplateId::K4 => 3,
        },
        regime: match k.regime {
            Regime::Low => 0,
            Regime::Normal => 1,
            Regime::High => 2,
        },
        tod: match k.tod {
            TimeOfDayBucket::Morning => 0,
            TimeOfDayBucket::Midday => 1,
            TimeOfDayBucket::Afternoon => 2,
        },
    }
}

fn decode_key(k: PersistedKey) -> ReliabilityKey {
    use fbot_decision::{Regime, TimeOfDayBucket};
    use fbot_schemas::TemplateId;
    ReliabilityKey {
        template: [TemplateId::K1, TemplateId::K2, TemplateId::K3, TemplateId::K4][k.template as usize],
        regime: [Regime::Low, Regime::Normal, Regime::High][k.regime as usize],
        tod: [TimeOfDayBucket::Morning, TimeOfDayBucket::Midday, TimeOfDayBucket::Afternoon][k.tod as usize],
    }
}

pub struct LearningStore {
    metrics: HashMap<ReliabilityKey, ReliabilityMetrics>,
    outcomes_since_persist: u32,
}

impl LearningStore {
    pub fn new() -> Self {
        Self {
            metrics: HashMap::new(),
            outcomes_since_persist: 0,
        }
    }

    pub fn metrics_for(&self, key: ReliabilityKey) -> ReliabilityMetrics {
        self.metrics.get(&key).cloned().unwrap_or_default()
    }

    /// Record a trade outcome, apply the state machine, and return the
    /// `LearningUpdate` event if the key's state changed.
    pub fn record(&mut self, outcome: &TradeOutcome) -> Option<LearningUpdate> {
        let key = ReliabilityKey {
            template: outcome.template_id,
            regime: outcome.regime,
            tod: outcome.tod,
        };
        let m = self.metrics.entry(key).or_default();
        let from_state = m.state;

        m.trades += 1;
        if outcome.is_win {
            m.wins += 1;
            m.consecutive_wins += 1;
            m.consecutive_losses = 0;
        } else {
            m.losses += 1;
            m.consecutive_losses += 1;
            m.consecutive_wins = 0;
        }
        m.expectancy_sum_usd += outcome.net_pnl_usd;
        m.recent_pnls.push_back(outcome.net_pnl_usd);
        if m.recent_pnls.len() > 5 {
            m.recent_pnls.pop_front();
        }

        let (to_state, trigger) = next_state(from_state, m);
        m.state = to_state;

        self.outcomes_since_persist += 1;

        if to_state != from_state {
            Some(LearningUpdate { key, from_state, to_state, trigger: trigger.unwrap() })
        } else {
            None
        }
    }

    pub fn should_persist(&self) -> bool {
        self.outcomes_since_persist >= PERSIST_EVERY_N_OUTCOMES
    }

    pub fn mark_persisted(&mut self) {
        self.outcomes_since_persist = 0;
    }

    pub fn export_state(&self) -> anyhow::Result<String> {
        let entries = self
            .metrics
            .iter()
            .map(|(k, v)| (encode_key(*k), v.clone()))
            .collect();
        Ok(serde_json::to_string(&PersistedState { entries })?)
    }

    /// Load previously exported state. Failure is never fatal to the
    /// caller: the loop is meant to start cold and emit a warning instead.
    pub fn load_state(&mut self, json: &str) -> anyhow::Result<()> {
        let persisted: PersistedState = serde_json::from_str(json)?;
        self.metrics = persisted
            .entries
            .into_iter()
            .map(|(k, v)| (decode_key(k), v))
            .collect();
        Ok(())
    }
}

impl Default for LearningStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LearningLookup for LearningStore {
    fn win_rate_lower_bound(&self, key: ReliabilityKey) -> f64 {
        self.metrics_for(key).win_rate_lower_bound()
    }

    fn euc_cost_multiplier(&self, key: ReliabilityKey) -> f64 {
        self.metrics_for(key).state.cost_multiplier()
    }
}

fn next_state(
    from: ReliabilityState,
    m: &ReliabilityMetrics,
) -> (ReliabilityState, Option<TriggerReason>) {
    use ReliabilityState::*;
    use TriggerReason::*;

    // Recovery check applies first to any non-active state. Two consecutive
    // wins is the sole recovery rule; a recent-5-trade expectancy check was
    // considered and rejected to keep exactly one recovery path.
    if from != Active {
        if m.consecutive_wins >= 2 {
            return (Active, Some(TwoConsecutiveWins));
        }
        // Quarantine only lifts via the explicit recovery rule above; it
        // never silently downgrades through the throttle bands below.
        if from == Quarantined {
            return (Quarantined, None);
        }
    }

    if m.consecutive_losses >= 2 {
        return (Quarantined, Some(TwoConsecutiveLosses));
    }
    if m.trades >= 5 && m.expectancy_usd() < 0.0 {
        return (Quarantined, Some(NegativeExpectancy5Plus));
    }
    if m.trades >= 10 && m.win_rate() < 0.40 {
        return (Quarantined, Some(LowWinRate10Plus));
    }

    let win_rate = m.win_rate();
    if m.trades >= 3 && (0.20..0.30).contains(&win_rate) {
        return (ThrottledHeavy, Some(WinRateBand20To30));
    }
    if m.trades >= 3 && (0.30..0.40).contains(&win_rate) {
        return (ThrottledMild, Some(WinRateBand30To40));
    }

    (from, None)
}
