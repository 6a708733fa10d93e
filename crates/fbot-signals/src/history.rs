//! Rolling indicator state maintained across bars: Wilder ATR(14)/ATR(30),
//! session VWAP (reset at RTH open), SMA(20), OBV, and a bounded swing-point
//! tracker. Deterministic bounded-tail truncation (no unbounded growth),
//! folding the rolling math in incrementally rather than recomputing over
//! the whole window.

use std::collections::VecDeque;

use chrono_tz::Tz;
use fbot_schemas::Bar;

use crate::session::{classify, minutes_since_local_midnight};
use crate::vector::{SignalVector, SkipReason};

const ATR_FAST_PERIOD: usize = 14;
const ATR_SLOW_PERIOD: usize = 30;
const SMA_PERIOD: usize = 20;
const VOLUME_WINDOW: usize = 20;
const SWING_LOOKBACK: usize = 20;
const OBV_SLOPE_WINDOW: usize = 10;

/// Exchange-session parameters the history needs to classify session phase
/// and reset the VWAP accumulator at RTH open. Deliberately plain fields
/// (not a dependency on `fbot-config`) so this crate stays a leaf.
#[derive(Clone, Debug)]
pub struct SessionParams {
    pub tz: Tz,
    pub rth_open_minute: u32,
    pub rth_close_minute: u32,
    pub exit_window_minutes: u32,
    pub tick_size: f64,
}

#[derive(Clone, Debug, Default)]
struct TrHistory {
    tr: VecDeque<f64>,
    atr_fast: Option<f64>,
    atr_slow: Option<f64>,
}

impl TrHistory {
    fn push(&mut self, tr: f64) {
        self.tr.push_back(tr);
        let needed = ATR_SLOW_PERIOD.max(ATR_FAST_PERIOD) + 1;
        while self.tr.len() > needed {
            self.tr.pop_front();
        }

        self.atr_fast = wilder_update(self.atr_fast, &self.tr, ATR_FAST_PERIOD);
        self.atr_slow = wilder_update(self.atr_slow, &self.tr, ATR_SLOW_PERIOD);
    }
}

/// Wilder's smoothing: seed with an SMA of the first `period` values, then
/// roll forward one value at a time. Recomputed from the bounded window each
/// call (the window is capped at period+1, so this stays O(period)).
fn wilder_update(prev: Option<f64>, tr: &VecDeque<f64>, period: usize) -> Option<f64> {
    if tr.len() < period {
        return None;
    }
    match prev {
        Some(prev_atr) if tr.len() > period => {
            let latest = *tr.back().unwrap();
            Some((prev_atr * (period as f64 - 1.0) + latest) / period as f64)
        }
        _ => {
            let seed: f64 = tr.iter().rev().take(period).sum::<f64>() / period as f64;
            Some(seed)
        }
    }
}

#[derive(Clone, Debug)]
pub struct SignalHistory {
    params: SessionParams,
    closes: VecDeque<f64>,
    volumes: VecDeque<i64>,
    obv: VecDeque<f64>,
    tr_hist: TrHistory,
    prev_close: Option<f64>,
    prev_bar_ts_secs: Option<i64>,
    session_day_key: Option<i64>,
    session_vwap_cum_pv: f64,
    session_vwap_cum_vol: i64,
    swing_highs: VecDeque<f64>,
    swing_lows: VecDeque<f64>,
    bars_since_swing_high: u32,
    bars_since_swing_low: u32,
}

impl SignalHistory {
    pub fn new(params: SessionParams) -> Self {
        Self {
            params,
            closes: VecDeque::new(),
            volumes: VecDeque::new(),
            obv: VecDeque::new(),
            tr_hist: TrHistory::default(),
            prev_close: None,
            prev_bar_ts_secs: None,
            session_day_key: None,
            session_vwap_cum_pv: 0.0,
            session_vwap_cum_vol: 0,
            swing_highs: VecDeque::new(),
            swing_lows: VecDeque::new(),
            bars_since_swing_high: 0,
            bars_since_swing_low: 0,
        }
    }

    /// Compute the full signal vector for this bar and fold it into the
    /// rolling state. Returns `Err(SkipReason::Warmup)` until ATR30/SMA20
    /// have enough history — never emits a partial reading.
    pub fn compute(&mut self, bar: &Bar) -> Result<SignalVector, SkipReason> {
        let close = bar.close.to_dollars();
        let high = bar.high.to_dollars();
        let low = bar.low.to_dollars();
        let open = bar.open.to_dollars();

        let minute_of_day = minutes_since_local_midnight(bar.ts_close_utc, self.params.tz);
        let day_key = bar.ts_close_utc.date_naive().and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp());
        if day_key != self.session_day_key {
            self.session_day_key = day_key;
            self.session_vwap_cum_pv = 0.0;
            self.session_vwap_cum_vol = 0;
        }

        let tr = match self.prev_close {
            Some(prev) => (high - low).max((high - prev).abs()).max((low - prev).abs()),
            None => high - low,
        };
        self.tr_hist.push(tr);

        let typical = (high + low + close) / 3.0;
        self.session_vwap_cum_pv += typical * bar.volume as f64;
        self.session_vwap_cum_vol += bar.volume;

        self.closes.push_back(close);
        if self.closes.len() > SMA_PERIOD {
            self.closes.pop_front();
        }
        self.volumes.push_back(bar.volume);
        if self.volumes.len() > VOLUME_WINDOW {
            self.volumes.pop_front();
        }

        let obv_delta = match self.prev_close {
            Some(prev) if close > prev => bar.volume as f64,
            Some(prev) if close < prev => -(bar.volume as f64),
            _ => 0.0,
        };
        let obv_value = self.obv.back().copied().unwrap_or(0.0) + obv_delta;
        self.obv.push_back(obv_value);
        if self.obv.len() > OBV_SLOPE_WINDOW + 1 {
            self.obv.pop_front();
        }

        self.swing_highs.push_back(high);
        if self.swing_highs.len() > SWING_LOOKBACK {
            self.swing_highs.pop_front();
        }
        self.swing_lows.push_back(low);
        if self.swing_lows.len() > SWING_LOOKBACK {
            self.swing_lows.pop_front();
        }
        if Some(high) == self.swing_highs.iter().cloned().fold(None, max_opt) {
            self.bars_since_swing_high = 0;
        } else {
            self.bars_since_swing_high = self.bars_since_swing_high.saturating_add(1);
        }
        if Some(low) == self.swing_lows.iter().cloned().fold(None, min_opt) {
            self.bars_since_swing_low = 0;
        } else {
            self.bars_since_swing_low = self.bars_since_swing_low.saturating_add(1);
        }

        let bar_ts_secs = bar.ts_close_utc.timestamp();
        let elapsed_secs = match self.prev_bar_ts_secs {
            Some(prev) => (bar_ts_secs - prev).max(1) as f64,
            None => 60.0,
        };
        self.prev_bar_ts_secs = Some(bar_ts_secs);
        self.prev_close = Some(close);

        let (atr14, atr30) = match (self.tr_hist.atr_fast, self.tr_hist.atr_slow) {
            (Some(f), Some(s)) => (f, s),
            _ => return Err(SkipReason::Warmup),
        };
        if self.closes.len() < SMA_PERIOD || self.volumes.len() < VOLUME_WINDOW {
            return Err(SkipReason::Warmup);
        }

        let sma20 = self.closes.iter().sum::<f64>() / self.closes.len() as f64;
        let session_vwap = if self.session_vwap_cum_vol > 0 {
            self.session_vwap_cum_pv / self.session_vwap_cum_vol as f64
        } else {
            close
        };

        let mean_vol = self.volumes.iter().sum::<i64>() as f64 / self.volumes.len() as f64;
        let var_vol = self
            .volumes
            .iter()
            .map(|v| {
                let d = *v as f64 - mean_vol;
                d * d
            })
            .sum::<f64>()
            / self.volumes.len() as f64;
        let std_vol = var_vol.sqrt();
        let volume_zscore = if std_vol > 0.0 {
            (bar.volume as f64 - mean_vol) / std_vol
        } else {
            0.0
        };
        let volume_vs_avg20 = if mean_vol > 0.0 {
            bar.volume as f64 / mean_vol
        } else {
            1.0
        };
        let volume_percentile = {
            let below = self.volumes.iter().filter(|v| **v <= bar.volume).count();
            below as f64 / self.volumes.len() as f64
        };

        let obv_slope = {
            let n = self.obv.len();
            if n >= 2 {
                (self.obv[n - 1] - self.obv[0]) / (n as f64 - 1.0)
            } else {
                0.0
            }
        };

        let range = (high - low).max(f64::EPSILON);
        let body_pct = (close - open).abs() / range;
        let upper_wick_pct = (high - close.max(open)) / range;
        let lower_wick_pct = (open.min(close) - low) / range;

        let mid = (bar.bid.to_dollars() + bar.ask.to_dollars()) / 2.0;
        let spread = (bar.ask.to_dollars() - bar.bid.to_dollars()).max(0.0);
        let spread_ticks = if self.params.tick_size > 0.0 {
            spread / self.params.tick_size
        } else {
            0.0
        };
        let spread_cost_bps = if mid > 0.0 { (spread / mid) * 10_000.0 } else { 0.0 };
        let slippage_estimate_ticks = spread_ticks * 0.5;

        let atr_ratio = if atr30 > 0.0 { atr14 / atr30 } else { 1.0 };
        let close_vs_vwap_pct = if session_vwap > 0.0 {
            (close - session_vwap) / session_vwap
        } else {
            0.0
        };
        let close_vs_sma20_pct = if sma20 > 0.0 { (close - sma20) / sma20 } else { 0.0 };

        let buy_sell_imbalance = ((close - open) / range).clamp(-1.0, 1.0);
        let cumulative_delta = self.obv.back().copied().unwrap_or(0.0);
        let participation_ratio = bar.volume as f64 / (bar.volume as f64 + mean_vol).max(1.0);
        let vwap_volume_weight = if self.session_vwap_cum_vol > 0 {
            bar.volume as f64 / self.session_vwap_cum_vol as f64
        } else {
            0.0
        };
        let tick_volume_rate = bar.volume as f64 / elapsed_secs;

        let minutes_since_open = minute_of_day.saturating_sub(self.params.rth_open_minute);
        let minutes_to_close = self.params.rth_close_minute.saturating_sub(minute_of_day);
        let session_phase = classify(
            minute_of_day,
            self.params.rth_open_minute,
            self.params.rth_close_minute,
            self.params.exit_window_minutes,
        );

        let momentum_score = (close_vs_vwap_pct.signum() * buy_sell_imbalance.abs()
            + obv_slope.signum() * 0.5)
            .clamp(-1.0, 1.0);
        let volatility_regime_score = (atr_ratio - 1.0).clamp(-1.0, 1.0).abs();
        let mean_reversion_score = if atr14 > 0.0 {
            (-close_vs_vwap_pct / (atr14 / close.max(f64::EPSILON))).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let trend_strength_score =
            (momentum_score.abs() * (1.0 - mean_reversion_score.abs())).clamp(0.0, 1.0);

        let spread_cost_penalty = (spread_cost_bps / 10.0).clamp(0.0, 1.0);
        let liquidity_score = (1.0 - spread_cost_penalty) * 0.5 + volume_percentile * 0.5;
        let exhaustion_score = (body_pct * (atr_ratio - 1.0).max(0.0)).clamp(0.0, 1.0);
        let breakout_direction = match (self.bars_since_swing_high, self.bars_since_swing_low) {
            (0, 0) => 0.0,
            (0, _) => 1.0,
            (_, 0) => -1.0,
            _ => 0.0,
        };
        let breakout_score = (breakout_direction * volume_percentile).clamp(-1.0, 1.0);

        Ok(SignalVector {
            atr14,
            atr30,
            atr_ratio,
            true_range: tr,
            range_pct: if close > 0.0 { range / close } else { 0.0 },
            body_pct,
            upper_wick_pct: upper_wick_pct.max(0.0),
            lower_wick_pct: lower_wick_pct.max(0.0),
            close_vs_vwap_pct,
            close_vs_sma20_pct,
            bars_since_swing_high: self.bars_since_swing_high,
            bars_since_swing_low: self.bars_since_swing_low,
            volume_zscore,
            volume_vs_avg20,
            obv_slope,
            vwap_volume_weight,
            buy_sell_imbalance,
            volume_percentile,
            tick_volume_rate,
            cumulative_delta,
            participation_ratio,
            session_phase,
            minutes_since_open,
            minutes_to_close,
            session_vwap_dist_pct: close_vs_vwap_pct,
            spread_ticks,
            spread_cost_bps,
            slippage_estimate_ticks,
            momentum_score,
            mean_reversion_score,
            volatility_regime_score,
            trend_strength_score,
            liquidity_score,
            exhaustion_score,
            breakout_score,
        })
    }
}

fn max_opt(a: Option<f64>, b: f64) -> Option<f64> {
    Some(a.map_or(b, |a| a.max(b)))
}
fn min_opt(a: Option<f64>, b: f64) -> Option<f64> {
    Some(a.map_or(b, |a| a.min(b)))
}
