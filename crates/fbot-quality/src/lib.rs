//! fbot-quality — C2 data/execution quality scorer.
//!
//! Runs an ordered set of gap/stale/disagreement detectors over the bar
//! stream, but instead of returning a boolean allow/reject it folds each
//! detector into a continuous [0,1] penalty. DVS (data validity score) and
//! EQS (execution quality score) are themselves just scalar inputs
//! elsewhere in the pipeline — the belief engine's applicability term and
//! the decision engine's uncertainty term — not independent gates; the
//! gate's use of fixed DVS/EQS thresholds lives in `fbot-gate`/
//! `fbot-decision`.

use fbot_schemas::{Bar, FeedMode};

/// Tunable weights for folding detector penalties into DVS/EQS. Not spec
/// thresholds (those live in `fbot-config::QualityConfig`) — these are the
/// internal blend weights of the scorer itself.
#[derive(Clone, Debug, PartialEq)]
pub struct QualityWeights {
    pub gap_penalty_per_bar: f64,
    pub stale_penalty: f64,
    pub delayed_feed_penalty: f64,
    pub historical_feed_penalty: f64,
    pub spread_penalty_scale: f64,
    pub low_volume_penalty_scale: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            gap_penalty_per_bar: 0.15,
            stale_penalty: 0.5,
            delayed_feed_penalty: 0.3,
            historical_feed_penalty: 1.0,
            spread_penalty_scale: 4.0,
            low_volume_penalty_scale: 0.5,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QualityScore {
    /// Data validity score: feed continuity, freshness, provenance.
    pub dvs: f64,
    /// Execution quality score: spread tightness, participation.
    pub eqs: f64,
}

/// Rolling state the scorer needs across bars: a short volume window to
/// judge whether the current bar's participation is thin relative to recent
/// history.
#[derive(Clone, Debug, Default)]
pub struct QualityState {
    recent_volumes: Vec<i64>,
}

impl QualityState {
    pub fn new() -> Self {
        Self {
            recent_volumes: Vec::new(),
        }
    }

    fn record(&mut self, volume: i64, window: usize) {
        self.recent_volumes.push(volume);
        if self.recent_volumes.len() > window {
            self.recent_volumes.remove(0);
        }
    }

    fn median_volume(&self) -> Option<i64> {
        if self.recent_volumes.is_empty() {
            return None;
        }
        let mut sorted = self.recent_volumes.clone();
        sorted.sort_unstable();
        Some(sorted[sorted.len() / 2])
    }
}

const VOLUME_WINDOW: usize = 30;

/// Score one bar against the current rolling state, updating it in place.
pub fn score(state: &mut QualityState, weights: &QualityWeights, bar: &Bar) -> QualityScore {
    let dvs = score_dvs(weights, bar);
    let eqs = score_eqs(state, weights, bar);
    state.record(bar.volume, VOLUME_WINDOW);
    QualityScore { dvs, eqs }
}

fn score_dvs(weights: &QualityWeights, bar: &Bar) -> f64 {
    let mut penalty = 0.0;

    penalty += weights.gap_penalty_per_bar * bar.provenance.gaps_observed as f64;

    if bar.provenance.stale {
        penalty += weights.stale_penalty;
    }

    penalty += match bar.provenance.feed_mode {
        FeedMode::Live => 0.0,
        FeedMode::Delayed => weights.delayed_feed_penalty,
        FeedMode::Historical => weights.historical_feed_penalty,
    };

    clamp01(1.0 - penalty)
}

fn score_eqs(state: &QualityState, weights: &QualityWeights, bar: &Bar) -> f64 {
    let mut penalty = 0.0;

    let mid = (bar.bid.to_dollars() + bar.ask.to_dollars()) / 2.0;
    if mid > 0.0 {
        let spread = (bar.ask.to_dollars() - bar.bid.to_dollars()).max(0.0);
        let relative_spread = spread / mid;
        penalty += relative_spread * weights.spread_penalty_scale;
    }

    if let Some(median) = state.median_volume() {
        if median > 0 && bar.volume < median {
            let shortfall = 1.0 - (bar.volume as f64 / median as f64);
            penalty += shortfall.max(0.0) * weights.low_volume_penalty_scale;
        }
    }

    clamp01(1.0 - penalty)
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fbot_schemas::{BarProvenance, Micros};

    fn bar(gaps: u32, stale: bool, mode: FeedMode, bid: f64, ask: f64, volume: i64) -> Bar {
        Bar {
            symbol: "MES".to_string(),
            ts_close_utc: Utc::now(),
            open: Micros::from_dollars(100.0),
            high: Micros::from_dollars(100.5),
            low: Micros::from_dollars(99.5),
            close: Micros::from_dollars(100.0),
            volume,
            bid: Micros::from_dollars(bid),
            ask: Micros::from_dollars(ask),
            provenance: BarProvenance {
                feed_mode: mode,
                gaps_observed: gaps,
                sequence: 1,
                stale,
            },
        }
    }

    #[test]
    fn clean_live_bar_scores_near_perfect() {
        let mut st = QualityState::new();
        let w = QualityWeights::default();
        let b = bar(0, false, FeedMode::Live, 99.99, 100.01, 1000);
        let s = score(&mut st, &w, &b);
        assert!(s.dvs > 0.95, "dvs={}", s.dvs);
        assert!(s.eqs > 0.95, "eqs={}", s.eqs);
    }

    #[test]
    fn gaps_degrade_dvs() {
        let mut st = QualityState::new();
        let w = QualityWeights::default();
        let b = bar(3, false, FeedMode::Live, 99.99, 100.01, 1000);
        let s = score(&mut st, &w, &b);
        assert!(s.dvs < 0.7, "dvs={}", s.dvs);
    }

    #[test]
    fn historical_feed_mode_collapses_dvs() {
        let mut st = QualityState::new();
        let w = QualityWeights::default();
        let b = bar(0, false, FeedMode::Historical, 99.99, 100.01, 1000);
        let s = score(&mut st, &w, &b);
        assert_eq!(s.dvs, 0.0);
    }

    #[test]
    fn wide_spread_degrades_eqs() {
        let mut st = QualityState::new();
        let w = QualityWeights::default();
        let b = bar(0, false, FeedMode::Live, 99.0, 101.0, 1000);
        let s = score(&mut st, &w, &b);
        assert!(s.eqs < 0.9, "eqs={}", s.eqs);
    }

    #[test]
    fn thin_volume_relative_to_recent_history_degrades_eqs() {
        let mut st = QualityState::new();
        let w = QualityWeights::default();
        for _ in 0..20 {
            score(&mut st, &w, &bar(0, false, FeedMode::Live, 99.99, 100.01, 1000));
        }
        let thin = bar(0, false, FeedMode::Live, 99.99, 100.01, 50);
        let s = score(&mut st, &w, &thin);
        assert!(s.eqs < 0.8, "eqs={}", s.eqs);
    }

    #[test]
    fn scores_are_always_clamped_to_unit_interval() {
        let mut st = QualityState::new();
        let w = QualityWeights::default();
        let b = bar(10, true, FeedMode::Historical, 90.0, 110.0, 1);
        let s = score(&mut st, &w, &b);
        assert!(s.dvs >= 0.0 && s.dvs <= 1.0);
        assert!(s.eqs >= 0.0 && s.eqs <= 1.0);
    }
}
