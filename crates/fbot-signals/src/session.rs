//! Exchange-local session phase. Never derived from a UTC offset alone —
//! always through an explicit `chrono_tz::Tz` conversion so daylight-saving
//! transitions don't silently shift the RTH window.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use fbot_schemas::SessionPhase;

/// Minutes since exchange-local midnight for a UTC instant.
pub fn minutes_since_local_midnight(ts_utc: DateTime<Utc>, tz: Tz) -> u32 {
    let local = tz.from_utc_datetime(&ts_utc.naive_utc());
    local.hour() * 60 + local.minute()
}

/// Classify the session phase from exchange-local minutes-since-midnight.
///
/// `rth_open_minute`/`rth_close_minute` bound the regular trading session.
/// `exit_window_minutes` defines the closing window before `rth_close_minute`
/// during which new entries should stop (the trade manager's session-exit
/// rule consumes this phase directly).
pub fn classify(
    minute_of_day: u32,
    rth_open_minute: u32,
    rth_close_minute: u32,
    exit_window_minutes: u32,
) -> SessionPhase {
    if minute_of_day < rth_open_minute {
        return SessionPhase::PreMarket;
    }
    if minute_of_day >= rth_close_minute {
        return SessionPhase::PostRth;
    }

    let opening_no_trade_end = rth_open_minute + 15;
    let closing_window_start = rth_close_minute.saturating_sub(exit_window_minutes);
    let lunch_start = 12 * 60; // 12:00 local
    let lunch_end = 13 * 60; // 13:00 local

    if minute_of_day < opening_no_trade_end {
        SessionPhase::OpeningNoTrade
    } else if minute_of_day >= closing_window_start {
        SessionPhase::ClosingWindow
    } else if (lunch_start..lunch_end).contains(&minute_of_day) {
        SessionPhase::Lunch
    } else if minute_of_day < lunch_start {
        SessionPhase::MidMorning
    } else {
        SessionPhase::Afternoon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: u32 = 9 * 60 + 30; // 09:30
    const CLOSE: u32 = 16 * 60; // 16:00

    #[test]
    fn before_open_is_premarket() {
        assert_eq!(classify(8 * 60, OPEN, CLOSE, 5), SessionPhase::PreMarket);
    }

    #[test]
    fn first_fifteen_minutes_are_no_trade() {
        assert_eq!(classify(OPEN + 5, OPEN, CLOSE, 5), SessionPhase::OpeningNoTrade);
    }

    #[test]
    fn mid_morning_after_opening_window() {
        assert_eq!(classify(OPEN + 30, OPEN, CLOSE, 5), SessionPhase::MidMorning);
    }

    #[test]
    fn lunch_window() {
        assert_eq!(classify(12 * 60 + 30, OPEN, CLOSE, 5), SessionPhase::Lunch);
    }

    #[test]
    fn afternoon_after_lunch() {
        assert_eq!(classify(14 * 60, OPEN, CLOSE, 5), SessionPhase::Afternoon);
    }

    #[test]
    fn closing_window_before_close() {
        assert_eq!(classify(CLOSE - 3, OPEN, CLOSE, 5), SessionPhase::ClosingWindow);
    }

    #[test]
    fn at_or_after_close_is_post_rth() {
        assert_eq!(classify(CLOSE, OPEN, CLOSE, 5), SessionPhase::PostRth);
    }
}
