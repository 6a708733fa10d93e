//! DVS collapses (here, via a bar flagged `FeedMode::Historical`, which
//! `fbot_quality::score_dvs` scores at exactly 0.0) — below the 0.30 kill
//! threshold on any bar, open position or not. The kill switch trips and
//! stays tripped; it is never cleared by a later clean bar.

use fbot_testkit::{clean_bar, historical_feed_bar, new_runner, rth_session_start, warm_up};

#[test]
fn historical_feed_bar_arms_the_kill_switch_and_it_stays_armed() {
    let mut runner = new_runner(5_000.0);
    let base = rth_session_start();

    warm_up(&mut runner, base, 40, 5_000.0);
    assert!(!runner.kill_switch_on());

    let bad = historical_feed_bar(base, 40, 5_000.0, 1_000);
    runner.on_bar(&bad, base + chrono::Duration::minutes(40)).unwrap();
    assert!(runner.kill_switch_on());

    let clean = clean_bar(base, 41, 5_000.0, 1_000);
    runner.on_bar(&clean, base + chrono::Duration::minutes(41)).unwrap();
    assert!(runner.kill_switch_on(), "kill switch is sticky for the life of the run");
}
