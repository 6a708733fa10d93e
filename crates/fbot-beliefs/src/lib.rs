//! fbot-beliefs — C3 belief engine.
//!
//! Pure function `update(prev, signals, session_phase, dvs, eqs) ->
//! BeliefState` over the fixed F1..F6 constraint set. Each constraint's
//! evidence is a small, explicit weighted sum over a sparse set of 1-3
//! signals; the `(a_i, b_i)` sigmoid-shaping constants and per-constraint
//! EWMA smoothing are this crate's own choice.

use fbot_schemas::{ConstraintId, SessionPhase};
use fbot_signals::SignalVector;

/// Sigmoid-shaping constants for one constraint: `L_i = sigmoid(a_i * e_i + b_i)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConstraintParams {
    pub a: f64,
    pub b: f64,
}

fn params_for(c: ConstraintId) -> ConstraintParams {
    match c {
        ConstraintId::F1 => ConstraintParams { a: 3.0, b: 0.0 },
        ConstraintId::F2 => ConstraintParams { a: 3.0, b: 0.0 },
        ConstraintId::F3 => ConstraintParams { a: 2.5, b: -0.2 },
        ConstraintId::F4 => ConstraintParams { a: 2.5, b: -0.2 },
        ConstraintId::F5 => ConstraintParams { a: 2.0, b: 0.0 },
        ConstraintId::F6 => ConstraintParams { a: 4.0, b: 0.5 },
    }
}

/// Evidence `e_i = sum_j w_ij * s_j`: the sparse signal -> constraint weight
/// matrix, written directly as small weighted sums rather than a literal
/// matrix since each constraint only reads 2-3 signals.
fn evidence_for(c: ConstraintId, s: &SignalVector) -> f64 {
    match c {
        // F1 <-> K1: momentum-breakout thesis.
        ConstraintId::F1 => 0.6 * s.momentum_score + 0.4 * s.trend_strength_score,
        // F2 <-> K2: mean-reversion thesis.
        ConstraintId::F2 => 0.6 * s.mean_reversion_score + 0.4 * (1.0 - s.volatility_regime_score),
        // F3 <-> K3: volume-confirmed continuation thesis.
        ConstraintId::F3 => 0.5 * s.momentum_score + 0.5 * (s.volume_zscore / 3.0).clamp(-1.0, 1.0),
        // F4 <-> K4: volatility-expansion breakout thesis.
        ConstraintId::F4 => 0.6 * s.volatility_regime_score + 0.4 * (s.atr_ratio - 1.0).clamp(-1.0, 1.0),
        // F5: session-quality / participation thesis backing a fifth template slot.
        ConstraintId::F5 => 0.5 * (s.session_vwap_dist_pct * 10.0).clamp(-1.0, 1.0)
            + 0.5 * s.participation_ratio,
        // F6: meta noise filter. High cost/slippage friction pushes evidence
        // negative, dragging `effective` down and signalling "too noisy to trade."
        ConstraintId::F6 => {
            1.0 - (s.spread_cost_bps / 50.0).clamp(0.0, 1.0)
                - (s.slippage_estimate_ticks / 5.0).clamp(0.0, 1.0)
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `g_session(phase)`: trade-seeking constraints (F1..F5) go sharply to 0
/// outside the trade-seeking session phases; the meta noise filter F6 stays
/// live across the whole session since friction matters regardless of timing.
fn session_gate(c: ConstraintId, phase: SessionPhase) -> f64 {
    if c == ConstraintId::F6 {
        1.0
    } else if phase.is_trade_seeking_eligible() {
        1.0
    } else {
        0.0
    }
}

/// `g_DVS(dvs)`: sharply 0 below the data-validity floor, 1 at or above it.
fn dvs_gate(dvs: f64) -> f64 {
    if dvs < 0.80 {
        0.0
    } else {
        1.0
    }
}

/// `g_EQS(eqs)`: ramps linearly to 1 at the execution-quality floor rather
/// than a hard cutoff, since EQS degradation is about cost not validity.
fn eqs_gate(eqs: f64) -> f64 {
    if eqs >= 0.75 {
        1.0
    } else {
        (eqs / 0.75).clamp(0.0, 1.0)
    }
}

/// One constraint's persisted belief. `effective = likelihood * applicability`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConstraintBelief {
    pub likelihood: f64,
    pub stability: f64,
    pub applicability: f64,
    pub effective: f64,
}

impl ConstraintBelief {
    fn initial() -> Self {
        Self {
            likelihood: 0.5,
            stability: 1.0,
            applicability: 0.0,
            effective: 0.0,
        }
    }
}

/// Full belief state over F1..F6, persisted across bars by the runner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeliefState {
    beliefs: [ConstraintBelief; 6],
}

impl BeliefState {
    pub fn initial() -> Self {
        Self {
            beliefs: [ConstraintBelief::initial(); 6],
        }
    }

    pub fn get(&self, c: ConstraintId) -> ConstraintBelief {
        self.beliefs[index_of(c)]
    }

    fn get_mut(&mut self, c: ConstraintId) -> &mut ConstraintBelief {
        &mut self.beliefs[index_of(c)]
    }
}

fn index_of(c: ConstraintId) -> usize {
    match c {
        ConstraintId::F1 => 0,
        ConstraintId::F2 => 1,
        ConstraintId::F3 => 2,
        ConstraintId::F4 => 3,
        ConstraintId::F5 => 4,
        ConstraintId::F6 => 5,
    }
}

/// Advance every constraint's belief by one bar.
pub fn update(prev: &BeliefState, signals: &SignalVector, dvs: f64, eqs: f64) -> BeliefState {
    let mut next = *prev;

    for c in ConstraintId::ALL {
        let params = params_for(c);
        let lambda = c.decay_lambda();

        let e = evidence_for(c, signals);
        let instantaneous = sigmoid(params.a * e + params.b);

        let prev_belief = prev.get(c);
        let smoothed_likelihood = lambda * prev_belief.likelihood + (1.0 - lambda) * instantaneous;

        let delta = (smoothed_likelihood - prev_belief.likelihood).abs();
        let stability = lambda * prev_belief.stability + (1.0 - lambda) * (1.0 - delta);

        let applicability = session_gate(c, signals.session_phase) * dvs_gate(dvs) * eqs_gate(eqs);
        let effective = smoothed_likelihood * applicability;

        *next.get_mut(c) = ConstraintBelief {
            likelihood: smoothed_likelihood,
            stability,
            applicability,
            effective,
        };
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_signals::SessionParams;

    fn signals_with(session_phase: SessionPhase, momentum: f64) -> SignalVector {
        let mut h = fbot_signals::SignalHistory::new(SessionParams {
            tz: chrono_tz::America::New_York,
            rth_open_minute: 9 * 60 + 30,
            rth_close_minute: 16 * 60,
            exit_window_minutes: 5,
            tick_size: 0.25,
        });
        use chrono::{TimeZone, Utc};
        use fbot_schemas::{Bar, BarProvenance, Micros};
        let mut last = None;
        for i in 0..40 {
            let ts = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap()
                + chrono::Duration::minutes(i);
            let close = 100.0 + i as f64 * momentum.signum() * 0.05;
            let b = Bar {
                symbol: "MES".to_string(),
                ts_close_utc: ts,
                open: Micros::from_dollars(close - 0.1),
                high: Micros::from_dollars(close + 0.2),
                low: Micros::from_dollars(close - 0.2),
                close: Micros::from_dollars(close),
                volume: 1000,
                bid: Micros::from_dollars(close - 0.05),
                ask: Micros::from_dollars(close + 0.05),
                provenance: BarProvenance::clean(i as u64),
            };
            if let Ok(v) = h.compute(&b) {
                last = Some(v);
            }
        }
        let mut v = last.unwrap();
        v.session_phase = session_phase;
        v
    }

    #[test]
    fn lunch_phase_zeroes_applicability_for_trade_seeking_constraints() {
        let prev = BeliefState::initial();
        let signals = signals_with(SessionPhase::Lunch, 1.0);
        let next = update(&prev, &signals, 0.95, 0.90);
        assert_eq!(next.get(ConstraintId::F1).applicability, 0.0);
        assert_eq!(next.get(ConstraintId::F1).effective, 0.0);
    }

    #[test]
    fn low_dvs_zeroes_applicability_for_all_trade_seeking_constraints() {
        let prev = BeliefState::initial();
        let signals = signals_with(SessionPhase::MidMorning, 1.0);
        let next = update(&prev, &signals, 0.5, 0.90);
        for c in [ConstraintId::F1, ConstraintId::F2, ConstraintId::F3, ConstraintId::F4] {
            assert_eq!(next.get(c).applicability, 0.0);
        }
    }

    #[test]
    fn f6_stays_applicable_through_lunch() {
        let prev = BeliefState::initial();
        let signals = signals_with(SessionPhase::Lunch, 1.0);
        let next = update(&prev, &signals, 0.95, 0.90);
        assert!(next.get(ConstraintId::F6).applicability > 0.0);
    }

    #[test]
    fn likelihood_and_effective_stay_in_unit_interval() {
        let prev = BeliefState::initial();
        let signals = signals_with(SessionPhase::MidMorning, 1.0);
        let next = update(&prev, &signals, 0.95, 0.90);
        for c in ConstraintId::ALL {
            let b = next.get(c);
            assert!((0.0..=1.0).contains(&b.likelihood));
            assert!((0.0..=1.0).contains(&b.effective));
            assert!((0.0..=1.0).contains(&b.stability));
        }
    }

    #[test]
    fn repeated_identical_bars_increase_stability() {
        let mut state = BeliefState::initial();
        let signals = signals_with(SessionPhase::MidMorning, 1.0);
        for _ in 0..10 {
            state = update(&state, &signals, 0.95, 0.90);
        }
        assert!(state.get(ConstraintId::F1).stability > 0.9);
    }
}
