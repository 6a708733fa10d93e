//! Default runner construction for the daemon process.
//!
//! The daemon boots a single `Runner<InMemoryBroker>` against conservative
//! default configuration and a disconnected broker; `POST /v1/arm` is what
//! flips it live. Wiring a real broker adapter and a live bar feed is the
//! daemon's next patch — this module exists so the HTTP surface has
//! something real to report on (`kill_switch_on`, `broker_connected`)
//! rather than stubs.

use uuid::Uuid;

use fbot_broker::{BrokerAdapter, InMemoryBroker};
use fbot_config::{
    InstrumentConfig, LearningConfig, QualityConfig, RiskConfig, RuntimeConfig, SessionConfig,
    SingleTemplateConfig, TemplateConfig,
};
use fbot_runtime::Runner;
use fbot_schemas::{BrokerAccountSnapshot, Micros};

const DEFAULT_EQUITY_USD: f64 = 5_000.0;

fn default_config() -> RuntimeConfig {
    fn template(thesis_constraint: &str, target_ticks: u32, stop_ticks_max: u32, max_minutes: i64) -> SingleTemplateConfig {
        SingleTemplateConfig {
            expected_reward_ticks: target_ticks as f64,
            target_ticks,
            stop_ticks_max,
            max_minutes,
            thesis_constraint: thesis_constraint.to_string(),
            thesis_floor: 0.40,
        }
    }

    RuntimeConfig {
        risk: RiskConfig::conservative_defaults(),
        quality: QualityConfig::conservative_defaults(),
        instrument: InstrumentConfig {
            symbol: "MES".to_string(),
            tick_size: 0.25,
            tick_value_usd: 1.25,
            round_trip_commission_usd: 2.50,
            min_days_to_expiry: 5,
        },
        session: SessionConfig {
            rth_open_minute: 9 * 60 + 30,
            rth_close_minute: 16 * 60,
            session_exit_window_minutes: 5,
            exchange_tz: "America/New_York".to_string(),
        },
        templates: TemplateConfig {
            k1: template("F1", 8, 10, 30),
            k2: template("F2", 8, 10, 30),
            k3: template("F3", 10, 12, 45),
            k4: template("F4", 12, 12, 60),
        },
        learning: LearningConfig::conservative_defaults(),
    }
}

/// Builds the daemon's default runner. The broker starts disconnected; the
/// daemon itself never calls `connect()` — that is a live-wiring concern for
/// a later patch, kept explicit rather than silently assumed.
pub fn default_runner(audit_path: &std::path::Path) -> anyhow::Result<Runner<InMemoryBroker>> {
    let account = BrokerAccountSnapshot {
        equity: Micros::from_dollars(DEFAULT_EQUITY_USD),
        buying_power: Micros::from_dollars(DEFAULT_EQUITY_USD),
        margin_used: Micros::from_dollars(0.0),
    };
    let broker = InMemoryBroker::new(account);
    let audit = fbot_audit::AuditWriter::new(audit_path, true)?;
    Ok(Runner::new(
        default_config(),
        Uuid::new_v4(),
        "MES".to_string(),
        broker,
        audit,
        chrono_tz::America::New_York,
        DEFAULT_EQUITY_USD,
    ))
}

#[allow(dead_code)]
fn connect_for_live(broker: &mut InMemoryBroker) -> anyhow::Result<()> {
    broker.connect()
}
