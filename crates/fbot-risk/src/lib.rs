//! fbot-risk
//!
//! The constitution and kill-switch engine. Staged, deterministic, pure
//! logic: no IO, no time, no broker calls. Enforces the daily-loss,
//! per-trade-risk, stop-distance, max-trades-per-day, and
//! consecutive-loss ceilings, plus a sticky halt once any of them fires.
//!
//! There is no PDT (Pattern Day Trader) check here: that rule only applies
//! to equities accounts and has no meaning for a futures instrument.

mod engine;
mod types;

pub use engine::{evaluate, tick, validate_equity_input};
pub use types::*;
