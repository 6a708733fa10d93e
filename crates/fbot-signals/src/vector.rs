//! The full signal vector computed once per closed bar. Grouped exactly as
//! spec'd: price-structure/volatility, volume/participation, session-context,
//! quality/cost, and a handful of derived aggregates. Every field documents
//! its normalized range; exact formulas are this crate's own to choose.

use fbot_schemas::SessionPhase;

/// One complete signal reading for a closed bar. `Skip` (see [`SkipReason`])
/// is returned instead whenever history is insufficient to fill every field.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalVector {
    // --- price-structure / volatility (normalized, mostly unitless ratios) ---
    /// Wilder ATR(14) in price units, always >= 0.
    pub atr14: f64,
    /// Wilder ATR(30) in price units, always >= 0.
    pub atr30: f64,
    /// atr14 / atr30. 1.0 == stable regime; > 1.0 == expanding volatility.
    pub atr_ratio: f64,
    /// True range of the current bar, price units, >= 0.
    pub true_range: f64,
    /// (high - low) / close. Typically in [0, 0.05] for a liquid future.
    pub range_pct: f64,
    /// |close - open| / (high - low). In [0, 1]; 0 == doji, 1 == marubozu.
    pub body_pct: f64,
    /// Upper wick as a fraction of the bar's range. In [0, 1].
    pub upper_wick_pct: f64,
    /// Lower wick as a fraction of the bar's range. In [0, 1].
    pub lower_wick_pct: f64,
    /// (close - session_vwap) / session_vwap. Signed, typically in [-0.02, 0.02].
    pub close_vs_vwap_pct: f64,
    /// (close - sma20) / sma20. Signed, typically in [-0.02, 0.02].
    pub close_vs_sma20_pct: f64,
    /// Bars since the last rolling swing high (lookback window), capped.
    pub bars_since_swing_high: u32,
    /// Bars since the last rolling swing low (lookback window), capped.
    pub bars_since_swing_low: u32,

    // --- volume / participation ---
    /// (volume - mean20) / stddev20. Unbounded, typically in [-3, 3].
    pub volume_zscore: f64,
    /// volume / mean20. 1.0 == average participation.
    pub volume_vs_avg20: f64,
    /// Slope of the on-balance-volume line over the last 10 bars, signed.
    pub obv_slope: f64,
    /// This bar's volume as a fraction of the session-to-date total volume.
    /// In [0, 1].
    pub vwap_volume_weight: f64,
    /// Estimated buy-vs-sell pressure from bar shape: in [-1, 1].
    pub buy_sell_imbalance: f64,
    /// Percentile rank of this bar's volume against the rolling window. In [0, 1].
    pub volume_percentile: f64,
    /// Bar volume divided by elapsed seconds since the previous bar close.
    pub tick_volume_rate: f64,
    /// Running signed cumulative delta proxy for the session, unitless.
    pub cumulative_delta: f64,
    /// volume / (volume + mean20). In [0, 1), saturating toward 1 on bursts.
    pub participation_ratio: f64,

    // --- session-context ---
    pub session_phase: SessionPhase,
    /// Minutes elapsed since the RTH open.
    pub minutes_since_open: u32,
    /// Minutes remaining until the RTH close.
    pub minutes_to_close: u32,
    /// Same value as `close_vs_vwap_pct`, kept distinct because the belief
    /// engine's session-context constraint reads it independently of the
    /// price-structure group.
    pub session_vwap_dist_pct: f64,

    // --- quality / cost ---
    /// Bid-ask spread expressed in ticks (tick_size supplied by the caller).
    pub spread_ticks: f64,
    /// Spread cost in basis points of the mid price.
    pub spread_cost_bps: f64,
    /// Heuristic slippage estimate in ticks for a market order of typical size.
    pub slippage_estimate_ticks: f64,

    // --- derived aggregates ---
    /// Blend of trend + volume direction agreement. In [-1, 1].
    pub momentum_score: f64,
    /// Distance from VWAP/SMA scaled by inverse volatility. In [-1, 1].
    pub mean_reversion_score: f64,
    /// atr_ratio rescaled to [0, 1]; 0 == compressed, 1 == highly expanded.
    pub volatility_regime_score: f64,
    /// Combination of momentum and low mean-reversion pull. In [0, 1].
    pub trend_strength_score: f64,
    /// Tight-spread, high-participation composite. In [0, 1]; 1 == cheap to
    /// trade right now.
    pub liquidity_score: f64,
    /// Large-body bar arriving on top of already-expanding volatility, a
    /// proxy for a move running out of room. In [0, 1].
    pub exhaustion_score: f64,
    /// Signed strength of a fresh swing break, scaled by how unusual this
    /// bar's volume was. In [-1, 1]; positive == new swing high.
    pub breakout_score: f64,
}

/// Why `compute` could not produce a [`SignalVector`] for this bar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Not enough history yet to fill ATR30/SMA20/volume-window fields.
    Warmup,
}
