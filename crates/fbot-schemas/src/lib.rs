//! Shared wire/value types for the single-instrument futures core.
//!
//! Kept dependency-free of every other workspace crate so it can sit at the
//! bottom of the graph: signals, beliefs, decisions, orders and events all
//! exchange these types by value, never by shared mutable reference.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Micros — fixed-point money/price type (1e-6 scale)
// ---------------------------------------------------------------------------

/// Fixed-point amount at 1e-6 scale. 1.00 == `Micros(1_000_000)`.
///
/// Used for prices, PnL and cash so float drift never enters order sizing or
/// risk arithmetic. No `From<i64>` — construction is always explicit via
/// [`Micros::new`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Micros(i64);

impl Micros {
    pub const SCALE: i64 = 1_000_000;
    pub const ZERO: Micros = Micros(0);

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn from_dollars(dollars: f64) -> Self {
        Micros((dollars * Self::SCALE as f64).round() as i64)
    }

    pub fn to_dollars(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn saturating_add(self, other: Micros) -> Micros {
        Micros(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Micros) -> Micros {
        Micros(self.0.saturating_sub(other.0))
    }

    /// Multiply a per-unit price by an integer quantity; `None` on overflow.
    pub fn checked_mul_qty(self, qty: i64) -> Option<Micros> {
        self.0.checked_mul(qty).map(Micros)
    }
}

impl Add for Micros {
    type Output = Micros;
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}
impl Sub for Micros {
    type Output = Micros;
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}
impl Neg for Micros {
    type Output = Micros;
    fn neg(self) -> Micros {
        Micros(-self.0)
    }
}
impl AddAssign for Micros {
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}
impl SubAssign for Micros {
    fn sub_assign(&mut self, rhs: Micros) {
        self.0 -= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

// ---------------------------------------------------------------------------
// Bar provenance + Bar
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedMode {
    Live,
    Delayed,
    Historical,
}

/// Operator-controlled execution toggle. `Observe` runs the full pipeline
/// (signals through the permission gate) but never lets an order reach the
/// broker; `Live` is the only mode the gate's `execution_armed` blocker can
/// pass. Boots `Observe` by default — an operator has to explicitly arm.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Observe,
    Live,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Observe
    }
}

/// Provenance flags attached to every bar per the data-quality contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarProvenance {
    pub feed_mode: FeedMode,
    /// Bars missing since the previous observed bar (0 = contiguous).
    pub gaps_observed: u32,
    /// Monotonically increasing sequence number from the feed.
    pub sequence: u64,
    /// Feed explicitly flagged this bar stale (no new prints this interval).
    pub stale: bool,
}

impl BarProvenance {
    pub fn clean(sequence: u64) -> Self {
        Self {
            feed_mode: FeedMode::Live,
            gaps_observed: 0,
            sequence,
            stale: false,
        }
    }
}

/// One closed one-minute bar. Immutable once produced; consumed once by the
/// signal engine and once by the quality scorer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    /// Bar close timestamp in UTC. Exchange-local wall-clock derivation
    /// (session phase, RTH windows) happens downstream via an explicit
    /// exchange-timezone conversion — never inferred from this field alone.
    pub ts_close_utc: DateTime<Utc>,
    pub open: Micros,
    pub high: Micros,
    pub low: Micros,
    pub close: Micros,
    pub volume: i64,
    pub bid: Micros,
    pub ask: Micros,
    pub provenance: BarProvenance,
}

// ---------------------------------------------------------------------------
// Session phase / capital tier / templates / constraints
// ---------------------------------------------------------------------------

/// Integer-coded session phase, 0..6, derived from exchange-local wall clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionPhase {
    PreMarket = 0,
    OpeningNoTrade = 1,
    MidMorning = 2,
    Lunch = 3,
    Afternoon = 4,
    ClosingWindow = 5,
    PostRth = 6,
}

impl SessionPhase {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_trade_seeking_eligible(self) -> bool {
        !matches!(
            self,
            SessionPhase::PreMarket | SessionPhase::Lunch | SessionPhase::PostRth
        )
    }
}

/// Equity band gating which templates and stop sizes are permitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapitalTier {
    S,
    A,
    B,
}

/// One of the four entry templates (K1..K4).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemplateId {
    K1,
    K2,
    K3,
    K4,
}

impl TemplateId {
    pub const ALL: [TemplateId; 4] = [TemplateId::K1, TemplateId::K2, TemplateId::K3, TemplateId::K4];
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One of the six belief constraints (F1..F6). F1..F4 map 1:1 to K1..K4; F5 is
/// reserved for a fifth thesis-style constraint; F6 is the meta noise filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintId {
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
}

impl ConstraintId {
    pub const ALL: [ConstraintId; 6] = [
        ConstraintId::F1,
        ConstraintId::F2,
        ConstraintId::F3,
        ConstraintId::F4,
        ConstraintId::F5,
        ConstraintId::F6,
    ];

    /// Per-constraint EWMA decay rate.
    pub fn decay_lambda(self) -> f64 {
        match self {
            ConstraintId::F1 => 0.96,
            ConstraintId::F2 => 0.95,
            ConstraintId::F3 => 0.95,
            ConstraintId::F4 => 0.95,
            ConstraintId::F5 => 0.94,
            ConstraintId::F6 => 0.97,
        }
    }

    /// Thesis constraint backing a given entry template (F1..F4 <-> K1..K4).
    pub fn for_template(t: TemplateId) -> ConstraintId {
        match t {
            TemplateId::K1 => ConstraintId::F1,
            TemplateId::K2 => ConstraintId::F2,
            TemplateId::K3 => ConstraintId::F3,
            TemplateId::K4 => ConstraintId::F4,
        }
    }
}

// ---------------------------------------------------------------------------
// Stable gate-denial / skip reason codes (closed set, never stringly typed
// at the call site — `Display` renders the stable wire string).
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    KillSwitchActive,
    DailyLossLimitBreached,
    TradesPerDayLimitBreached,
    ConsecutiveLossLimitBreached,
    DvsGateFailed,
    EqsGateFailed,
    SessionClosed,
    EquityTooLow,
    StrategyQuarantined,
    EucRejected,
    StopTooTightOrWide,
    SizeZero,
    BeliefTooLow,
    SignalUnavailable,
    Warmup,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReasonCode::KillSwitchActive => "KILL_SWITCH_ACTIVE",
            ReasonCode::DailyLossLimitBreached => "DAILY_LOSS_LIMIT_BREACHED",
            ReasonCode::TradesPerDayLimitBreached => "TRADES_PER_DAY_LIMIT_BREACHED",
            ReasonCode::ConsecutiveLossLimitBreached => "CONSECUTIVE_LOSS_LIMIT_BREACHED",
            ReasonCode::DvsGateFailed => "DVS_GATE_FAILED",
            ReasonCode::EqsGateFailed => "EQS_GATE_FAILED",
            ReasonCode::SessionClosed => "SESSION_CLOSED",
            ReasonCode::EquityTooLow => "EQUITY_TOO_LOW",
            ReasonCode::StrategyQuarantined => "STRATEGY_QUARANTINED",
            ReasonCode::EucRejected => "EUC_REJECTED",
            ReasonCode::StopTooTightOrWide => "STOP_TOO_TIGHT_OR_WIDE",
            ReasonCode::SizeZero => "SIZE_ZERO",
            ReasonCode::BeliefTooLow => "BELIEF_TOO_LOW",
            ReasonCode::SignalUnavailable => "SIGNAL_UNAVAILABLE",
            ReasonCode::Warmup => "WARMUP",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Event envelope + stable event-kind discriminator
// ---------------------------------------------------------------------------

/// Generic envelope wrapping a typed payload with run/causation metadata.
/// Mirrors the append-only audit record shape: every event carries enough to
/// reconstruct ordering and provenance without a shared mutable log object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub config_hash: String,
    pub payload: T,
}

/// Closed discriminator for every event kind the runner can emit. Stored
/// alongside a JSON payload in the audit log so replay can dispatch on a
/// fixed set of strings instead of ad-hoc event-type text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Bar,
    Quality,
    Signals,
    Beliefs,
    Decision,
    OrderIntent,
    OrderAck,
    Fill,
    TradeExit,
    LearningUpdate,
    KillSwitch,
    ReadinessSnapshot,
    Reconciliation,
    SessionExitFlatten,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Bar => "BAR",
            EventKind::Quality => "QUALITY",
            EventKind::Signals => "SIGNALS",
            EventKind::Beliefs => "BELIEFS",
            EventKind::Decision => "DECISION",
            EventKind::OrderIntent => "ORDER_INTENT",
            EventKind::OrderAck => "ORDER_ACK",
            EventKind::Fill => "FILL",
            EventKind::TradeExit => "TRADE_EXIT",
            EventKind::LearningUpdate => "LEARNING_UPDATE",
            EventKind::KillSwitch => "KILL_SWITCH",
            EventKind::ReadinessSnapshot => "READINESS_SNAPSHOT",
            EventKind::Reconciliation => "RECONCILIATION",
            EventKind::SessionExitFlatten => "SESSION_EXIT_FLATTEN",
        }
    }
}

// ---------------------------------------------------------------------------
// Broker snapshot shapes (external interface)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerAccountSnapshot {
    pub equity: Micros,
    pub buying_power: Micros,
    pub margin_used: Micros,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPositionSnapshot {
    pub symbol: String,
    pub qty_signed: i64,
    pub avg_price: Micros,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerOrderKind {
    Limit,
    Stop,
    Target,
    MarketEquivalentFlatten,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerOrderState {
    New,
    Accepted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOrderSnapshot {
    pub broker_order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub kind: BrokerOrderKind,
    pub state: BrokerOrderState,
    pub qty: i64,
    pub filled_qty: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub captured_at_utc: DateTime<Utc>,
    pub account: BrokerAccountSnapshot,
    pub positions: Vec<BrokerPositionSnapshot>,
    pub orders: Vec<BrokerOrderSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_roundtrip() {
        let m = Micros::from_dollars(12.50);
        assert_eq!(m.raw(), 12_500_000);
        assert!((m.to_dollars() - 12.50).abs() < 1e-9);
    }

    #[test]
    fn micros_checked_mul_overflow_detected() {
        let m = Micros::new(i64::MAX);
        assert!(m.checked_mul_qty(2).is_none());
    }

    #[test]
    fn constraint_for_template_matches_k_numbering() {
        assert_eq!(ConstraintId::for_template(TemplateId::K3), ConstraintId::F3);
    }

    #[test]
    fn session_phase_trade_seeking_excludes_lunch() {
        assert!(!SessionPhase::Lunch.is_trade_seeking_eligible());
        assert!(SessionPhase::MidMorning.is_trade_seeking_eligible());
    }
}
