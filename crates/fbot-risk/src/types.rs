use std::collections::BTreeMap;

/// 1e-6 fixed-point scale, matching `fbot_schemas::Micros`.
pub const MICROS_SCALE: i64 = 1_000_000;

/// The constitution: the futures instrument's fixed risk ceilings.
/// Conservative defaults (`fbot-config`'s `RiskConfig::conservative_defaults`)
/// are `max_risk_usd_per_trade=15`, `max_stop_ticks=12`,
/// `max_trades_per_day=2`, `max_daily_loss_usd=30`,
/// `max_consecutive_losses=2`.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskConfig {
    /// If equity drops by this amount from day-start equity, halt trading.
    pub daily_loss_limit_micros: i64,

    /// Maximum trades allowed to open in a single trading day.
    pub max_trades_per_day: u32,

    /// Consecutive realized losses before a sticky halt fires.
    pub max_consecutive_losses: u32,

    /// Per-trade risk ceiling; the gate and decision engine must have
    /// already sized the position so planned risk never exceeds this, but
    /// the risk engine re-checks it as a last line of defense.
    pub max_risk_per_trade_micros: i64,

    /// Maximum stop distance in ticks a new bracket may be submitted with.
    pub max_stop_ticks: u32,
}

impl RiskConfig {
    /// Build from the plain numeric fields of `fbot_config::RiskConfig`.
    /// Kept as loose f64/u32 args (rather than a dependency on
    /// `fbot-config`) so this crate stays dependency-free and pure.
    pub fn from_usd(
        max_risk_usd_per_trade: f64,
        max_stop_ticks: u32,
        max_trades_per_day: u32,
        max_daily_loss_usd: f64,
        max_consecutive_losses: u32,
    ) -> Self {
        Self {
            daily_loss_limit_micros: (max_daily_loss_usd * MICROS_SCALE as f64) as i64,
            max_trades_per_day,
            max_consecutive_losses,
            max_risk_per_trade_micros: (max_risk_usd_per_trade * MICROS_SCALE as f64) as i64,
            max_stop_ticks,
        }
    }
}

/// What the caller is asking permission to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    NewOrder,
    ModifyOrder,
    Flatten,
}

/// Kill switch categories.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KillSwitchType {
    DataQualityCollapse,
    StaleData,
    RejectStorm,
    Desync,
    Manual,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KillSwitchEvent {
    pub kind: KillSwitchType,
    pub code: String,
    pub evidence: BTreeMap<String, String>,
}

impl KillSwitchEvent {
    pub fn new(kind: KillSwitchType) -> Self {
        let code = match kind {
            KillSwitchType::DataQualityCollapse => "KILL_SWITCH_DATA_QUALITY_COLLAPSE",
            KillSwitchType::StaleData => "KILL_SWITCH_STALE_DATA",
            KillSwitchType::RejectStorm => "KILL_SWITCH_REJECT_STORM",
            KillSwitchType::Desync => "KILL_SWITCH_DESYNC",
            KillSwitchType::Manual => "KILL_SWITCH_MANUAL",
        }
        .to_string();

        Self {
            kind,
            code,
            evidence: BTreeMap::new(),
        }
    }

    pub fn with_evidence(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.evidence.insert(k.into(), v.into());
        self
    }
}

/// Inputs for one risk evaluation tick.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskInput {
    pub day_id: u32,
    pub equity_micros: i64,
    pub reject_window_id: u32,
    pub request: RequestKind,
    pub is_risk_reducing: bool,
    /// Planned per-trade risk for a `NewOrder` request, in micros.
    pub planned_risk_micros: i64,
    /// Planned stop distance in ticks for a `NewOrder` request.
    pub planned_stop_ticks: u32,
    /// Trades already opened today (from the trade manager).
    pub trades_opened_today: u32,
    /// Consecutive realized losses (from the learning loop).
    pub consecutive_losses: u32,
    pub kill_switch: Option<KillSwitchEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskDecision {
    pub action: RiskAction,
    pub reason: ReasonCode,
    pub kill_switch: Option<KillSwitchEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RiskAction {
    Allow,
    Reject,
    Halt,
    FlattenAndHalt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReasonCode {
    Allowed,
    AlreadyHalted,
    DailyLossLimitBreached,
    MaxTradesPerDayReached,
    MaxConsecutiveLossesReached,
    RiskPerTradeExceeded,
    StopTicksExceeded,
    RejectStormBreached,
    KillSwitchTriggered,
    BadInput,
}

/// Risk engine state, owned and persisted by the runner.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskState {
    pub day_id: u32,
    pub day_start_equity_micros: i64,

    pub halted: bool,
    pub disarmed: bool,

    pub reject_window_id: u32,
    pub reject_count_in_window: u32,
}

impl RiskState {
    pub fn new(day_id: u32, equity_micros: i64, reject_window_id: u32) -> Self {
        Self {
            day_id,
            day_start_equity_micros: equity_micros,
            halted: false,
            disarmed: false,
            reject_window_id,
            reject_count_in_window: 0,
        }
    }

    pub fn record_reject(&mut self, reject_window_id: u32) {
        if reject_window_id != self.reject_window_id {
            self.reject_window_id = reject_window_id;
            self.reject_count_in_window = 0;
        }
        self.reject_count_in_window = self.reject_count_in_window.saturating_add(1);
    }
}
