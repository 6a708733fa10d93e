//! fbot-testkit — deterministic scenario-test harness.
//!
//! A thin composition of the real engines (here, a single
//! `fbot_runtime::Runner`) driven by hand-built bars rather than a live
//! feed, so a scenario is just "feed this sequence of bars, then assert on
//! the runner's public state." No network I/O, no wall clock inside the
//! harness — every timestamp is caller-supplied.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use fbot_broker::InMemoryBroker;
use fbot_config::{
    InstrumentConfig, LearningConfig, QualityConfig, RiskConfig, SessionConfig,
    SingleTemplateConfig, TemplateConfig,
};
use fbot_runtime::Runner;
use fbot_schemas::{Bar, BarProvenance, BrokerAccountSnapshot, FeedMode, Micros};

/// Conservative runtime configuration assembled from each sub-config's own
/// `conservative_defaults`, with fixed instrument/session/template values
/// filled in for the MES scenario bench.
pub fn default_runtime_config() -> fbot_config::RuntimeConfig {
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

    fbot_config::RuntimeConfig {
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

pub fn account(equity_usd: f64) -> BrokerAccountSnapshot {
    BrokerAccountSnapshot {
        equity: Micros::from_dollars(equity_usd),
        buying_power: Micros::from_dollars(equity_usd),
        margin_used: Micros::from_dollars(0.0),
    }
}

/// 09:31 America/New_York on a fixed reference day, inside RTH and well clear
/// of the close-exit window, so bars built from this clock enter the
/// decision step rather than being gated by session phase alone.
pub fn rth_session_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 13, 31, 0).unwrap()
}

/// 06:00 America/New_York — before the 09:30 RTH open, so every bar built
/// from this clock is gated at the session-phase check regardless of signal
/// values.
pub fn premarket_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap()
}

/// A clean one-minute bar `minute_offset` minutes after `base`.
pub fn clean_bar(base: DateTime<Utc>, minute_offset: i64, close: f64, volume: i64) -> Bar {
    bar_with_provenance(base, minute_offset, close, volume, BarProvenance::clean(minute_offset as u64))
}

/// A bar whose provenance is flagged `FeedMode::Historical`, which collapses
/// DVS to exactly 0.0 (see `fbot_quality::score_dvs`) — the deterministic way
/// to force a data-quality kill-switch trip without touching signal values.
pub fn historical_feed_bar(base: DateTime<Utc>, minute_offset: i64, close: f64, volume: i64) -> Bar {
    bar_with_provenance(
        base,
        minute_offset,
        close,
        volume,
        BarProvenance {
            feed_mode: FeedMode::Historical,
            gaps_observed: 0,
            sequence: minute_offset as u64,
            stale: false,
        },
    )
}

fn bar_with_provenance(base: DateTime<Utc>, minute_offset: i64, close: f64, volume: i64, provenance: BarProvenance) -> Bar {
    Bar {
        symbol: "MES".to_string(),
        ts_close_utc: base + chrono::Duration::minutes(minute_offset),
        open: Micros::from_dollars(close),
        high: Micros::from_dollars(close),
        low: Micros::from_dollars(close),
        close: Micros::from_dollars(close),
        volume,
        bid: Micros::from_dollars(close - 0.05),
        ask: Micros::from_dollars(close + 0.05),
        provenance,
    }
}

/// Builds a `Runner<InMemoryBroker>` wired to the conservative default
/// config, a connected in-memory broker seeded with `equity_usd`, and a
/// throwaway audit log under the OS temp dir (unique per call, never
/// cleaned up — scenario runs are cheap and short-lived).
pub fn new_runner(equity_usd: f64) -> Runner<InMemoryBroker> {
    let mut broker = InMemoryBroker::new(account(equity_usd));
    broker.connect().expect("in-memory broker always connects");
    let audit_path = std::env::temp_dir().join(format!("fbot-testkit-{}.jsonl", Uuid::new_v4()));
    let audit = fbot_audit::AuditWriter::new(&audit_path, false).expect("audit writer over temp dir");
    let mut runner = Runner::new(
        default_runtime_config(),
        Uuid::new_v4(),
        "MES".to_string(),
        broker,
        audit,
        chrono_tz::America::New_York,
        equity_usd,
    );
    // Scenario tests exercise the live entry/exit path; a runner built by
    // this harness starts armed rather than in the operator-facing default
    // observe-only mode.
    runner.arm();
    runner
}

/// Feeds a closed-form sequence of clean bars through `runner`, one per
/// minute starting at `base`, to carry the signal engine's rolling windows
/// past warmup. Returns the number of bars fed.
pub fn warm_up(runner: &mut Runner<InMemoryBroker>, base: DateTime<Utc>, bars: usize, start_price: f64) -> usize {
    for i in 0..bars as i64 {
        let bar = clean_bar(base, i, start_price + i as f64 * 0.01, 1_000);
        let now = base + chrono::Duration::minutes(i);
        runner.on_bar(&bar, now).expect("on_bar must not error on clean bars");
    }
    bars
}

/// A losing `TradeOutcome` for the learning loop, independent of the full
/// decision/execution pipeline — used to drive `fbot_learning::LearningStore`
/// directly when a scenario only needs to prove the throttle state machine's
/// reaction to a streak of outcomes, not how those outcomes were produced.
pub fn losing_outcome(template_id: fbot_schemas::TemplateId) -> fbot_trademgr::TradeOutcome {
    fbot_trademgr::TradeOutcome {
        template_id,
        regime: fbot_decision::Regime::Normal,
        tod: fbot_decision::TimeOfDayBucket::Morning,
        side: fbot_schemas::Side::Buy,
        entry_price: Micros::from_dollars(5_000.0),
        exit_price: Micros::from_dollars(4_999.0),
        size: 1,
        gross_pnl_usd: -1.25,
        commission_usd: 2.50,
        net_pnl_usd: -3.75,
        is_win: false,
        duration_minutes: 5,
        exit_reason: fbot_trademgr::ExitReason::StopHit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_carries_runner_past_signal_warmup_without_error() {
        let mut runner = new_runner(5_000.0);
        warm_up(&mut runner, premarket_start(), 40, 5_000.0);
        assert!(!runner.has_open_trade());
    }
}
