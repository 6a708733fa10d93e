use fbot_schemas::{CapitalTier, Micros, ReasonCode, Side, TemplateId};

/// Snapshot of the risk engine's sticky flags as the decision engine needs
/// them. The decision engine never re-evaluates the constitution itself —
/// it only reads what `fbot-risk` already decided this bar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RiskSnapshot {
    pub kill_switch_on: bool,
    pub daily_loss_breached: bool,
    pub trades_per_day_breached: bool,
    pub consecutive_losses_breached: bool,
}

/// Volatility regime bucket used both for the learning loop's reliability
/// key and the `TradeOutcome` attribution bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Regime {
    Low,
    Normal,
    High,
}

impl Regime {
    pub fn from_volatility_score(volatility_regime_score: f64) -> Self {
        if volatility_regime_score < 0.33 {
            Regime::Low
        } else if volatility_regime_score < 0.66 {
            Regime::Normal
        } else {
            Regime::High
        }
    }
}

/// Time-of-day bucket for the same attribution/reliability purposes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimeOfDayBucket {
    Morning,
    Midday,
    Afternoon,
}

impl TimeOfDayBucket {
    pub fn from_session_phase(phase: fbot_schemas::SessionPhase) -> Self {
        use fbot_schemas::SessionPhase::*;
        match phase {
            PreMarket | OpeningNoTrade | MidMorning => TimeOfDayBucket::Morning,
            Lunch => TimeOfDayBucket::Midday,
            Afternoon | ClosingWindow | PostRth => TimeOfDayBucket::Afternoon,
        }
    }
}

/// Key the learning loop indexes reliability metrics and EUC cost
/// multipliers by.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReliabilityKey {
    pub template: TemplateId,
    pub regime: Regime,
    pub tod: TimeOfDayBucket,
}

/// Read-only view into `fbot-learning`'s reliability metrics. Defined here
/// (not in `fbot-learning`) so the decision engine can take it as a trait
/// object without depending on the learning crate's storage details.
pub trait LearningLookup {
    /// Wilson lower-bound win rate for this key (default prior when few trades).
    fn win_rate_lower_bound(&self, key: ReliabilityKey) -> f64;
    /// Multiplicative EUC cost penalty; `f64::INFINITY` when quarantined.
    fn euc_cost_multiplier(&self, key: ReliabilityKey) -> f64;
}

/// Snapshot of `{session_open, execution_enabled, data_quality, dte,
/// kill_switch_state}` stamped onto every decision for audit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MarketContext {
    pub session_open: bool,
    pub execution_enabled: bool,
    pub dvs: f64,
    pub eqs: f64,
    pub days_to_expiry: u32,
    pub kill_switch_state: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OrderIntent {
    pub template_id: TemplateId,
    pub side: Side,
    pub entry_limit: Micros,
    pub stop_ticks: u32,
    pub target_ticks: u32,
    pub size: u32,
    pub euc_score: f64,
    pub market_context: MarketContext,
    /// Regime/tod bucket the EUC scoring stage computed this bar. The
    /// runner carries these onto the opened position so the learning loop
    /// attributes the eventual outcome to the bucket the trade entered
    /// under.
    pub regime: Regime,
    pub tod: TimeOfDayBucket,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Decision {
    NoTrade(ReasonCode),
    Enter(OrderIntent),
}

pub fn capital_tier(equity_usd: f64) -> Option<CapitalTier> {
    if equity_usd < 1_500.0 {
        None
    } else if equity_usd < 2_500.0 {
        Some(CapitalTier::S)
    } else if equity_usd < 7_500.0 {
        Some(CapitalTier::A)
    } else {
        Some(CapitalTier::B)
    }
}

pub fn templates_allowed_for_tier(tier: CapitalTier) -> &'static [TemplateId] {
    match tier {
        CapitalTier::S => &[TemplateId::K1, TemplateId::K2],
        CapitalTier::A => &[TemplateId::K1, TemplateId::K2, TemplateId::K3],
        CapitalTier::B => &[TemplateId::K1, TemplateId::K2, TemplateId::K3, TemplateId::K4],
    }
}
