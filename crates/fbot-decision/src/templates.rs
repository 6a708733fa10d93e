//! K1..K4 entry templates. Closed sum type over a static dispatch table:
//! each template owns a pure `detect`, `side_for`, and a static config
//! record. `decide` (in `lib.rs`) drives the table; nothing here touches
//! risk, quality or execution state.

use fbot_schemas::{ConstraintId, Side, TemplateId};
use fbot_signals::SignalVector;

use crate::types::Regime;

/// Static per-template shape (`expected_reward_ticks`, `target_ticks`,
/// `stop_ticks_max`, `max_minutes`) plus the fields `fbot-trademgr` needs
/// to manage a live position once this crate has handed off an
/// `OrderIntent`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TemplateSpec {
    pub id: TemplateId,
    pub thesis_constraint: ConstraintId,
    pub thesis_floor: f64,
    pub expected_reward_ticks: f64,
    pub target_ticks: u32,
    pub stop_ticks_min: u32,
    pub stop_ticks_max: u32,
    pub max_minutes: i64,
    /// Exit a position early if the adverse excursion exceeds this many
    /// ATRs; read by `fbot-trademgr`'s volatility-exit check.
    pub vol_exit_atr_multiple: f64,
    /// Preferred capital-tier eligible regime, informational only; the
    /// belief thesis and EUC scoring are what actually gate entry.
    pub preferred_regime: Regime,
}

pub fn spec_for(id: TemplateId) -> TemplateSpec {
    match id {
        TemplateId::K1 => TemplateSpec {
            id,
            thesis_constraint: ConstraintId::F1,
            thesis_floor: 0.55,
            expected_reward_ticks: 8.0,
            target_ticks: 8,
            stop_ticks_min: 3,
            stop_ticks_max: 6,
            max_minutes: 45,
            vol_exit_atr_multiple: 2.0,
            preferred_regime: Regime::Normal,
        },
        TemplateId::K2 => TemplateSpec {
            id,
            thesis_constraint: ConstraintId::F2,
            thesis_floor: 0.55,
            expected_reward_ticks: 6.0,
            target_ticks: 6,
            stop_ticks_min: 3,
            stop_ticks_max: 5,
            max_minutes: 30,
            vol_exit_atr_multiple: 1.5,
            preferred_regime: Regime::Low,
        },
        TemplateId::K3 => TemplateSpec {
            id,
            thesis_constraint: ConstraintId::F3,
            thesis_floor: 0.60,
            expected_reward_ticks: 10.0,
            target_ticks: 10,
            stop_ticks_min: 4,
            stop_ticks_max: 7,
            max_minutes: 60,
            vol_exit_atr_multiple: 2.0,
            preferred_regime: Regime::Normal,
        },
        TemplateId::K4 => TemplateSpec {
            id,
            thesis_constraint: ConstraintId::F4,
            thesis_floor: 0.65,
            expected_reward_ticks: 14.0,
            target_ticks: 14,
            stop_ticks_min: 6,
            stop_ticks_max: 10,
            max_minutes: 60,
            vol_exit_atr_multiple: 2.5,
            preferred_regime: Regime::High,
        },
    }
}

/// Directional bias this template would take on the current bar, or `None`
/// if its own signal reading has no clear direction (never trade sideways).
pub fn side_for(id: TemplateId, signals: &SignalVector) -> Option<Side> {
    match id {
        TemplateId::K1 | TemplateId::K3 => {
            if signals.momentum_score > 0.0 {
                Some(Side::Buy)
            } else if signals.momentum_score < 0.0 {
                Some(Side::Sell)
            } else {
                None
            }
        }
        TemplateId::K2 => {
            // Fade: trade back toward VWAP, opposite the dislocation sign.
            if signals.session_vwap_dist_pct > 0.0 {
                Some(Side::Sell)
            } else if signals.session_vwap_dist_pct < 0.0 {
                Some(Side::Buy)
            } else {
                None
            }
        }
        TemplateId::K4 => {
            // Expansion breakout: ride whichever side the range broke toward.
            if signals.buy_sell_imbalance > 0.05 {
                Some(Side::Buy)
            } else if signals.buy_sell_imbalance < -0.05 {
                Some(Side::Sell)
            } else {
                None
            }
        }
    }
}
