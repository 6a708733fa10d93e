use std::collections::VecDeque;

use fbot_decision::ReliabilityKey;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityState {
    Active,
    ThrottledMild,
    ThrottledHeavy,
    Quarantined,
}

impl ReliabilityState {
    pub fn cost_multiplier(self) -> f64 {
        match self {
            ReliabilityState::Active => 1.0,
            ReliabilityState::ThrottledMild => 1.2,
            ReliabilityState::ThrottledHeavy => 1.5,
            ReliabilityState::Quarantined => f64::INFINITY,
        }
    }
}

/// Rolling per-key record. `recent_pnls` keeps the last 5 net PnLs for
/// diagnostics only; recovery is decided solely by `consecutive_wins`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReliabilityMetrics {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_losses: u32,
    pub consecutive_wins: u32,
    pub expectancy_sum_usd: f64,
    pub state: ReliabilityState,
    #[serde(default)]
    pub recent_pnls: VecDeque<f64>,
}

impl ReliabilityMetrics {
    pub fn new() -> Self {
        Self {
            trades: 0,
            wins: 0,
            losses: 0,
            consecutive_losses: 0,
            consecutive_wins: 0,
            expectancy_sum_usd: 0.0,
            state: ReliabilityState::Active,
            recent_pnls: VecDeque::new(),
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.5 // default prior with no history
        } else {
            self.wins as f64 / self.trades as f64
        }
    }

    pub fn expectancy_usd(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.expectancy_sum_usd / self.trades as f64
        }
    }

    /// Wilson lower-bound win rate at 95% confidence, falling back to the
    /// 0.5 prior when too few trades have been recorded to be informative.
    pub fn win_rate_lower_bound(&self) -> f64 {
        if self.trades < 3 {
            return 0.5;
        }
        let n = self.trades as f64;
        let p = self.win_rate();
        let z = 1.96_f64;
        let z2 = z * z;
        let denom = 1.0 + z2 / n;
        let center = p + z2 / (2.0 * n);
        let margin = z * ((p * (1.0 - p) / n) + z2 / (4.0 * n * n)).sqrt();
        ((center - margin) / denom).clamp(0.0, 1.0)
    }

}

impl Default for ReliabilityMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerReason {
    TwoConsecutiveLosses,
    NegativeExpectancy5Plus,
    LowWinRate10Plus,
    WinRateBand30To40,
    WinRateBand20To30,
    TwoConsecutiveWins,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LearningUpdate {
    pub key: ReliabilityKey,
    pub from_state: ReliabilityState,
    pub to_state: ReliabilityState,
    pub trigger: TriggerReason,
}
