use serde::{Deserialize, Serialize};

/// Risk / constitution limits — fixed default values, expressed as
/// configuration so tests can flex them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_risk_usd_per_trade: f64,
    pub max_stop_ticks: u32,
    pub max_trades_per_day: u32,
    pub max_daily_loss_usd: f64,
    pub max_consecutive_losses: u32,
}

impl RiskConfig {
    pub fn conservative_defaults() -> Self {
        Self {
            max_risk_usd_per_trade: 15.0,
            max_stop_ticks: 12,
            max_trades_per_day: 2,
            max_daily_loss_usd: 30.0,
            max_consecutive_losses: 2,
        }
    }
}

/// Data/execution quality thresholds. These three numbers are the only
/// fixed numeric thresholds in the pipeline; everything else is runtime
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    pub dvs_min: f64,
    pub eqs_min: f64,
    pub dvs_kill: f64,
}

impl QualityConfig {
    pub fn conservative_defaults() -> Self {
        Self {
            dvs_min: 0.80,
            eqs_min: 0.75,
            dvs_kill: 0.30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub tick_size: f64,
    pub tick_value_usd: f64,
    pub round_trip_commission_usd: f64,
    pub min_days_to_expiry: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minutes since exchange-local midnight.
    pub rth_open_minute: u32,
    pub rth_close_minute: u32,
    pub session_exit_window_minutes: u32,
    pub exchange_tz: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleTemplateConfig {
    pub expected_reward_ticks: f64,
    pub target_ticks: u32,
    pub stop_ticks_max: u32,
    pub max_minutes: i64,
    pub thesis_constraint: String,
    pub thesis_floor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub k1: SingleTemplateConfig,
    pub k2: SingleTemplateConfig,
    pub k3: SingleTemplateConfig,
    pub k4: SingleTemplateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    pub quarantine_consecutive_losses: u32,
    pub quarantine_min_trades_for_expectancy: u32,
    pub quarantine_min_trades_for_win_rate: u32,
}

impl LearningConfig {
    pub fn conservative_defaults() -> Self {
        Self {
            quarantine_consecutive_losses: 2,
            quarantine_min_trades_for_expectancy: 5,
            quarantine_min_trades_for_win_rate: 10,
        }
    }
}
