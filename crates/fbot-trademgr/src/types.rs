use chrono::{DateTime, Utc};
use fbot_decision::{Regime, TimeOfDayBucket};
use fbot_execution::ChildRole;
use fbot_schemas::{ConstraintId, Micros, Side, TemplateId};

/// A live position this crate is managing. Created by `on_fill`, consumed by
/// `tick` until a flatten decision closes it out.
#[derive(Clone, Debug, PartialEq)]
pub struct TradePosition {
    pub client_order_id: String,
    pub template_id: TemplateId,
    pub thesis_constraint: ConstraintId,
    pub side: Side,
    pub entry_price: Micros,
    pub entry_time: DateTime<Utc>,
    pub size: u32,
    pub max_minutes: i64,
    pub vol_exit_atr_multiple: f64,
    pub thesis_floor: f64,
    pub atr_at_entry: f64,
    /// Regime/tod bucket in effect when the decision engine entered this
    /// trade. Carried through to `compute_outcome` so the learning loop
    /// attributes the outcome to the bucket the trade actually occurred in,
    /// not whatever is current at exit time.
    pub entry_regime: Regime,
    pub entry_tod: TimeOfDayBucket,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    ThesisInvalid,
    TimeExit,
    VolatilityExit,
    StopHealthFailure,
    /// The resting stop leg filled on its own; not a `tick` decision.
    StopHit,
    /// The resting target leg filled on its own; not a `tick` decision.
    TargetHit,
    /// Closed by the session-exit rule rather than any in-trade condition.
    SessionExit,
    /// Closed by the kill-switch/reconciliation flatten path.
    KillSwitchFlatten,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TradeManagerAction {
    Hold,
    RequestReArm(ChildRole),
    Flatten(ExitReason),
}

/// Realized result of a closed trade, handed to the learning loop (C7).
#[derive(Clone, Debug, PartialEq)]
pub struct TradeOutcome {
    pub template_id: TemplateId,
    pub regime: Regime,
    pub tod: TimeOfDayBucket,
    pub side: Side,
    pub entry_price: Micros,
    pub exit_price: Micros,
    pub size: u32,
    pub gross_pnl_usd: f64,
    pub commission_usd: f64,
    pub net_pnl_usd: f64,
    pub is_win: bool,
    pub duration_minutes: i64,
    pub exit_reason: ExitReason,
}
