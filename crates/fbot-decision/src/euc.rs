//! Edge - Uncertainty - Cost scoring. Each of the three terms is computed
//! independently and kept on the returned record so audit payloads can show
//! why a template was accepted or rejected, not just the final scalar.

use fbot_beliefs::ConstraintBelief;
use fbot_signals::SignalVector;

use crate::templates::TemplateSpec;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EucScore {
    pub edge: f64,
    pub uncertainty: f64,
    pub cost: f64,
    pub euc: f64,
}

pub struct EucThresholds {
    pub min_edge: f64,
    pub max_uncertainty: f64,
    pub max_cost: f64,
    pub min_euc: f64,
}

impl Default for EucThresholds {
    fn default() -> Self {
        Self {
            min_edge: 0.10,
            max_uncertainty: 0.40,
            max_cost: 0.30,
            min_euc: 0.0,
        }
    }
}

impl EucThresholds {
    pub fn accepts(&self, s: &EucScore) -> bool {
        s.edge >= self.min_edge
            && s.uncertainty <= self.max_uncertainty
            && s.cost <= self.max_cost
            && s.euc >= self.min_euc
    }
}

/// `Edge`: expected reward in ticks scaled by the learning loop's Wilson
/// lower-bound win rate, saturating toward 1 rather than growing unbounded.
fn edge(spec: &TemplateSpec, win_rate_lb: f64) -> f64 {
    let raw = spec.expected_reward_ticks * win_rate_lb;
    raw / (raw + 5.0)
}

/// `Uncertainty`: blend of data validity, execution quality, belief
/// stability and belief strength, each contributing its complement.
fn uncertainty(dvs: f64, eqs: f64, belief: &ConstraintBelief) -> f64 {
    0.30 * (1.0 - dvs)
        + 0.25 * (1.0 - eqs)
        + 0.25 * (1.0 - belief.stability)
        + 0.20 * (1.0 - belief.effective)
}

/// `Cost`: friction (spread + slippage, normalized by the reward the trade
/// is chasing) amplified by the learning loop's per-bucket cost multiplier.
fn cost(spec: &TemplateSpec, signals: &SignalVector, cost_multiplier: f64) -> f64 {
    let friction = signals.spread_cost_bps / 10_000.0
        + signals.slippage_estimate_ticks / spec.expected_reward_ticks.max(1.0);
    (friction * cost_multiplier).clamp(0.0, 2.0)
}

pub fn score(
    spec: &TemplateSpec,
    signals: &SignalVector,
    belief: &ConstraintBelief,
    dvs: f64,
    eqs: f64,
    win_rate_lb: f64,
    cost_multiplier: f64,
) -> EucScore {
    let e = edge(spec, win_rate_lb);
    let u = uncertainty(dvs, eqs, belief);
    let c = cost(spec, signals, cost_multiplier);
    EucScore {
        edge: e,
        uncertainty: u,
        cost: c,
        euc: e - u - c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_schemas::TemplateId;

    fn belief(effective: f64, stability: f64) -> ConstraintBelief {
        ConstraintBelief {
            likelihood: effective,
            stability,
            applicability: 1.0,
            effective,
        }
    }

    #[test]
    fn higher_win_rate_increases_edge() {
        let spec = crate::templates::spec_for(TemplateId::K1);
        let low = edge(&spec, 0.40);
        let high = edge(&spec, 0.70);
        assert!(high > low);
    }

    #[test]
    fn lower_stability_increases_uncertainty() {
        let stable = belief(0.8, 0.95);
        let unstable = belief(0.8, 0.3);
        assert!(uncertainty(0.95, 0.9, &unstable) > uncertainty(0.95, 0.9, &stable));
    }

    #[test]
    fn cost_multiplier_amplifies_cost() {
        let spec = crate::templates::spec_for(TemplateId::K1);
        let signals = crate::tests_support::sample_signals();
        let c1 = cost(&spec, &signals, 1.0);
        let c2 = cost(&spec, &signals, 3.0);
        assert!(c2 > c1);
    }

    #[test]
    fn threshold_accepts_rejects_by_each_term() {
        let t = EucThresholds::default();
        let good = EucScore { edge: 0.3, uncertainty: 0.1, cost: 0.1, euc: 0.1 };
        assert!(t.accepts(&good));
        let bad_edge = EucScore { edge: 0.05, ..good };
        assert!(!t.accepts(&bad_edge));
    }
}
