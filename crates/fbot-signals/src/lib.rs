//! fbot-signals — C1 signal engine.
//!
//! `compute(bar, history) -> SignalVector | Skip`. Maintains rolling history
//! sufficient for ATR14/ATR30 Wilder smoothing and session VWAP reset at RTH
//! open. Session phase is computed from a `chrono_tz::Tz` exchange calendar,
//! never from a raw UTC offset.

mod history;
mod session;
mod vector;

pub use history::{SessionParams, SignalHistory};
pub use session::classify as classify_session_phase;
pub use vector::{SignalVector, SkipReason};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fbot_schemas::{Bar, BarProvenance, Micros};

    fn params() -> SessionParams {
        SessionParams {
            tz: chrono_tz::America::New_York,
            rth_open_minute: 9 * 60 + 30,
            rth_close_minute: 16 * 60,
            exit_window_minutes: 5,
            tick_size: 0.25,
        }
    }

    fn bar_at(minute_offset: i64, close: f64, volume: i64) -> Bar {
        let ts = Utc
            .with_ymd_and_hms(2026, 3, 2, 14, 30, 0)
            .unwrap()
            + chrono::Duration::minutes(minute_offset);
        Bar {
            symbol: "MES".to_string(),
            ts_close_utc: ts,
            open: Micros::from_dollars(close - 0.25),
            high: Micros::from_dollars(close + 0.5),
            low: Micros::from_dollars(close - 0.5),
            close: Micros::from_dollars(close),
            volume,
            bid: Micros::from_dollars(close - 0.05),
            ask: Micros::from_dollars(close + 0.05),
            provenance: BarProvenance::clean(minute_offset as u64),
        }
    }

    #[test]
    fn warmup_skips_until_history_is_full() {
        let mut h = SignalHistory::new(params());
        let mut saw_skip = false;
        for i in 0..40 {
            let r = h.compute(&bar_at(i, 100.0 + i as f64 * 0.01, 1000));
            if r.is_err() {
                saw_skip = true;
            }
        }
        assert!(saw_skip, "expected at least one warmup skip");
    }

    #[test]
    fn eventually_produces_a_full_vector() {
        let mut h = SignalHistory::new(params());
        let mut last = None;
        for i in 0..40 {
            if let Ok(v) = h.compute(&bar_at(i, 100.0 + (i as f64 * 0.01).sin(), 1000)) {
                last = Some(v);
            }
        }
        let v = last.expect("should have produced a signal vector by bar 40");
        assert!(v.atr14 >= 0.0);
        assert!(v.atr30 >= 0.0);
        assert!((0.0..=1.0).contains(&v.body_pct));
        assert!((0.0..=1.0).contains(&v.volume_percentile));
    }

    #[test]
    fn session_vwap_resets_on_new_day() {
        let mut h = SignalHistory::new(params());
        for i in 0..25 {
            let _ = h.compute(&bar_at(i, 100.0, 1000));
        }
        // Jump a full day ahead; VWAP accumulator must reset rather than
        // blend yesterday's volume into today's typical price.
        let next_day = h.compute(&bar_at(24 * 60, 100.0, 1000));
        assert!(next_day.is_ok());
    }
}
