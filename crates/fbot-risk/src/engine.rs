use crate::{
    KillSwitchEvent, KillSwitchType, ReasonCode, RequestKind, RiskAction, RiskConfig, RiskDecision,
    RiskInput, RiskState,
};

// ---------------------------------------------------------------------------
// Sanity clamps
// ---------------------------------------------------------------------------

/// Guard: `equity_micros` must be >= 0. Equity is never negative in this
/// system; a negative value means upstream state is corrupted.
pub fn validate_equity_input(equity_micros: i64) -> Option<RiskDecision> {
    if equity_micros < 0 {
        return Some(RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::BadInput,
            kill_switch: None,
        });
    }
    None
}

// ---------------------------------------------------------------------------
// Core engine
// ---------------------------------------------------------------------------

/// Deterministic tick maintenance: day rollover resets day-start equity,
/// reject-window rollover resets the reject counter.
pub fn tick(_cfg: &RiskConfig, st: &mut RiskState, inp: &RiskInput) {
    if inp.day_id != st.day_id {
        st.day_id = inp.day_id;
        st.day_start_equity_micros = inp.equity_micros;
    }

    if inp.reject_window_id != st.reject_window_id {
        st.reject_window_id = inp.reject_window_id;
        st.reject_count_in_window = 0;
    }
}

/// Main evaluator: pure deterministic logic plus sticky flags in state.
pub fn evaluate(cfg: &RiskConfig, st: &mut RiskState, inp: &RiskInput) -> RiskDecision {
    if validate_equity_input(inp.equity_micros).is_some() {
        st.halted = true;
        return RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::BadInput,
            kill_switch: None,
        };
    }

    tick(cfg, st, inp);

    // 1) Kill switch overrides everything.
    if let Some(ks) = &inp.kill_switch {
        st.halted = true;
        st.disarmed = true;
        return RiskDecision {
            action: RiskAction::FlattenAndHalt,
            reason: ReasonCode::KillSwitchTriggered,
            kill_switch: Some(ks.clone()),
        };
    }

    // 2) Sticky halt: once halted, only flatten is allowed through.
    if st.halted {
        return match inp.request {
            RequestKind::Flatten => RiskDecision {
                action: RiskAction::Allow,
                reason: ReasonCode::AlreadyHalted,
                kill_switch: None,
            },
            _ => RiskDecision {
                action: RiskAction::Reject,
                reason: ReasonCode::AlreadyHalted,
                kill_switch: None,
            },
        };
    }

    // 3) Max consecutive losses: sticky halt for the rest of the day.
    if inp.request == RequestKind::NewOrder
        && inp.consecutive_losses >= cfg.max_consecutive_losses
    {
        st.halted = true;
        return RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::MaxConsecutiveLossesReached,
            kill_switch: None,
        };
    }

    // 4) Daily loss limit.
    if cfg.daily_loss_limit_micros > 0 {
        match st
            .day_start_equity_micros
            .checked_sub(cfg.daily_loss_limit_micros)
        {
            None => {
                st.halted = true;
                return RiskDecision {
                    action: RiskAction::Halt,
                    reason: ReasonCode::BadInput,
                    kill_switch: None,
                };
            }
            Some(floor) => {
                if inp.equity_micros <= floor {
                    st.halted = true;
                    return RiskDecision {
                        action: RiskAction::Halt,
                        reason: ReasonCode::DailyLossLimitBreached,
                        kill_switch: Some(
                            KillSwitchEvent::new(KillSwitchType::Manual)
                                .with_evidence("type", "DAILY_LOSS_LIMIT")
                                .with_evidence(
                                    "day_start_equity_micros",
                                    st.day_start_equity_micros.to_string(),
                                )
                                .with_evidence("equity_micros", inp.equity_micros.to_string()),
                        ),
                    };
                }
            }
        }
    }

    if !inp.is_risk_reducing && inp.request == RequestKind::NewOrder {
        // 5) Max trades per day.
        if inp.trades_opened_today >= cfg.max_trades_per_day {
            return RiskDecision {
                action: RiskAction::Reject,
                reason: ReasonCode::MaxTradesPerDayReached,
                kill_switch: None,
            };
        }

        // 6) Per-trade risk ceiling.
        if inp.planned_risk_micros > cfg.max_risk_per_trade_micros {
            return RiskDecision {
                action: RiskAction::Reject,
                reason: ReasonCode::RiskPerTradeExceeded,
                kill_switch: None,
            };
        }

        // 7) Stop distance ceiling.
        if inp.planned_stop_ticks > cfg.max_stop_ticks {
            return RiskDecision {
                action: RiskAction::Reject,
                reason: ReasonCode::StopTicksExceeded,
                kill_switch: None,
            };
        }
    }

    // 8) Reject storm.
    if st.reject_count_in_window >= 10 {
        st.halted = true;
        return RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::RejectStormBreached,
            kill_switch: Some(
                KillSwitchEvent::new(KillSwitchType::RejectStorm)
                    .with_evidence("reject_window_id", st.reject_window_id.to_string())
                    .with_evidence(
                        "reject_count_in_window",
                        st.reject_count_in_window.to_string(),
                    ),
            ),
        };
    }

    RiskDecision {
        action: RiskAction::Allow,
        reason: ReasonCode::Allowed,
        kill_switch: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RiskConfig {
        RiskConfig::from_usd(15.0, 12, 2, 30.0, 2)
    }

    fn base_input(request: RequestKind) -> RiskInput {
        RiskInput {
            day_id: 1,
            equity_micros: 100_000_000_000,
            reject_window_id: 1,
            request,
            is_risk_reducing: false,
            planned_risk_micros: 10_000_000,
            planned_stop_ticks: 8,
            trades_opened_today: 0,
            consecutive_losses: 0,
            kill_switch: None,
        }
    }

    #[test]
    fn allows_clean_new_order() {
        let cfg = cfg();
        let mut st = RiskState::new(1, 100_000_000_000, 1);
        let d = evaluate(&cfg, &mut st, &base_input(RequestKind::NewOrder));
        assert_eq!(d.action, RiskAction::Allow);
    }

    #[test]
    fn max_trades_per_day_rejects() {
        let cfg = cfg();
        let mut st = RiskState::new(1, 100_000_000_000, 1);
        let mut inp = base_input(RequestKind::NewOrder);
        inp.trades_opened_today = 2;
        let d = evaluate(&cfg, &mut st, &inp);
        assert_eq!(d.action, RiskAction::Reject);
        assert_eq!(d.reason, ReasonCode::MaxTradesPerDayReached);
    }

    #[test]
    fn consecutive_losses_sticky_halts() {
        let cfg = cfg();
        let mut st = RiskState::new(1, 100_000_000_000, 1);
        let mut inp = base_input(RequestKind::NewOrder);
        inp.consecutive_losses = 2;
        let d = evaluate(&cfg, &mut st, &inp);
        assert_eq!(d.action, RiskAction::Halt);
        assert!(st.halted);

        // Once halted, even a clean request is rejected.
        let clean = base_input(RequestKind::NewOrder);
        let d2 = evaluate(&cfg, &mut st, &clean);
        assert_eq!(d2.action, RiskAction::Reject);
        assert_eq!(d2.reason, ReasonCode::AlreadyHalted);
    }

    #[test]
    fn daily_loss_limit_halts_and_is_sticky() {
        let cfg = cfg();
        let mut st = RiskState::new(1, 100_000_000_000, 1);
        let mut inp = base_input(RequestKind::NewOrder);
        inp.equity_micros = 100_000_000_000 - 31_000_000;
        let d = evaluate(&cfg, &mut st, &inp);
        assert_eq!(d.action, RiskAction::Halt);
        assert_eq!(d.reason, ReasonCode::DailyLossLimitBreached);

        let flatten = base_input(RequestKind::Flatten);
        let d2 = evaluate(&cfg, &mut st, &flatten);
        assert_eq!(d2.action, RiskAction::Allow);
    }

    #[test]
    fn kill_switch_overrides_and_flattens() {
        let cfg = cfg();
        let mut st = RiskState::new(1, 100_000_000_000, 1);
        let mut inp = base_input(RequestKind::NewOrder);
        inp.kill_switch = Some(KillSwitchEvent::new(KillSwitchType::DataQualityCollapse));
        let d = evaluate(&cfg, &mut st, &inp);
        assert_eq!(d.action, RiskAction::FlattenAndHalt);
        assert!(st.halted);
        assert!(st.disarmed);
    }

    #[test]
    fn stop_ticks_exceeding_ceiling_rejects() {
        let cfg = cfg();
        let mut st = RiskState::new(1, 100_000_000_000, 1);
        let mut inp = base_input(RequestKind::NewOrder);
        inp.planned_stop_ticks = 13;
        let d = evaluate(&cfg, &mut st, &inp);
        assert_eq!(d.reason, ReasonCode::StopTicksExceeded);
    }

    #[test]
    fn day_rollover_resets_day_start_equity() {
        let cfg = cfg();
        let mut st = RiskState::new(1, 100_000_000_000, 1);
        let mut inp = base_input(RequestKind::NewOrder);
        inp.day_id = 2;
        inp.equity_micros = 90_000_000_000;
        let _ = evaluate(&cfg, &mut st, &inp);
        assert_eq!(st.day_start_equity_micros, 90_000_000_000);
    }
}
