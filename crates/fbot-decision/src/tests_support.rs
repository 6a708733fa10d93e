//! Shared signal-vector fixture for unit tests across this crate.

use fbot_schemas::SessionPhase;
use fbot_signals::SignalVector;

pub fn sample_signals() -> SignalVector {
    SignalVector {
        atr14: 2.0,
        atr30: 2.0,
        atr_ratio: 1.0,
        true_range: 2.0,
        range_pct: 0.01,
        body_pct: 0.6,
        upper_wick_pct: 0.2,
        lower_wick_pct: 0.2,
        close_vs_vwap_pct: 0.001,
        close_vs_sma20_pct: 0.001,
        bars_since_swing_high: 5,
        bars_since_swing_low: 5,
        volume_zscore: 0.5,
        volume_vs_avg20: 1.1,
        obv_slope: 0.2,
        vwap_volume_weight: 0.05,
        buy_sell_imbalance: 0.1,
        volume_percentile: 0.6,
        tick_volume_rate: 10.0,
        cumulative_delta: 100.0,
        participation_ratio: 0.4,
        session_phase: SessionPhase::MidMorning,
        minutes_since_open: 60,
        minutes_to_close: 330,
        session_vwap_dist_pct: 0.001,
        spread_ticks: 1.0,
        spread_cost_bps: 2.0,
        slippage_estimate_ticks: 0.5,
        momentum_score: 0.4,
        mean_reversion_score: 0.1,
        volatility_regime_score: 0.5,
        trend_strength_score: 0.5,
        liquidity_score: 0.7,
        exhaustion_score: 0.1,
        breakout_score: 0.2,
    }
}
