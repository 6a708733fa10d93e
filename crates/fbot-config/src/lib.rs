//! Layered YAML configuration loader + canonical config hashing.
//!
//! Loading is a pure two-step pipeline: deep-merge N YAML documents into one
//! JSON value, then canonicalize (recursively sort object keys) and SHA-256
//! the result. The resulting `config_hash` is stamped on every event emitted
//! by the runner so a later audit can fingerprint exactly which configuration
//! produced a given decision.

mod secrets;
mod templates;

pub use secrets::{resolve_secrets, ResolvedSecrets};
pub use templates::{
    InstrumentConfig, LearningConfig, QualityConfig, RiskConfig, SessionConfig,
    SingleTemplateConfig, TemplateConfig,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Full runtime configuration, deserialized from the merged/canonicalized
/// YAML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub risk: RiskConfig,
    pub quality: QualityConfig,
    pub instrument: InstrumentConfig,
    pub session: SessionConfig,
    pub templates: TemplateConfig,
    pub learning: LearningConfig,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: RuntimeConfig,
    pub config_hash: String,
}

/// Load + deep-merge YAML files in order (later files override earlier ones),
/// canonicalize to JSON, hash, then deserialize into [`RuntimeConfig`].
pub fn load_layered_yaml(paths: &[&Path]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {}", p.display()))?;
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(&s).with_context(|| format!("parse yaml: {}", p.display()))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let config_hash = hex::encode(hasher.finalize());

    let config: RuntimeConfig =
        serde_json::from_str(&canonical).context("config does not match RuntimeConfig shape")?;

    Ok(LoadedConfig {
        config,
        config_hash,
    })
}

fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn config_hash_is_stable_across_key_order() {
        let base = write_tmp(
            r#"
risk: { max_risk_usd_per_trade: 15, max_stop_ticks: 12, max_trades_per_day: 2, max_daily_loss_usd: 30, max_consecutive_losses: 2 }
quality: { dvs_min: 0.80, eqs_min: 0.75, dvs_kill: 0.30 }
instrument: { symbol: "MES", tick_size: 0.25, tick_value_usd: 1.25, round_trip_commission_usd: 2.50, min_days_to_expiry: 5 }
session: { rth_open_minute: 570, rth_close_minute: 960, session_exit_window_minutes: 5, exchange_tz: "America/New_York" }
templates: { k1: { expected_reward_ticks: 8, target_ticks: 8, stop_ticks_max: 10, max_minutes: 30, thesis_constraint: "F1", thesis_floor: 0.40 },
             k2: { expected_reward_ticks: 8, target_ticks: 8, stop_ticks_max: 10, max_minutes: 30, thesis_constraint: "F2", thesis_floor: 0.40 },
             k3: { expected_reward_ticks: 10, target_ticks: 10, stop_ticks_max: 12, max_minutes: 45, thesis_constraint: "F3", thesis_floor: 0.40 },
             k4: { expected_reward_ticks: 12, target_ticks: 12, stop_ticks_max: 12, max_minutes: 60, thesis_constraint: "F4", thesis_floor: 0.40 } }
learning: { quarantine_consecutive_losses: 2, quarantine_min_trades_for_expectancy: 5, quarantine_min_trades_for_win_rate: 10 }
"#,
        );
        let loaded = load_layered_yaml(&[base.path()]).unwrap();
        assert_eq!(loaded.config.instrument.symbol, "MES");
        assert_eq!(loaded.config.risk.max_stop_ticks, 12);

        // Re-hashing an equivalent document with keys in a different order
        // must produce the same hash.
        let reordered = write_tmp(
            r#"
instrument: { min_days_to_expiry: 5, round_trip_commission_usd: 2.50, tick_value_usd: 1.25, tick_size: 0.25, symbol: "MES" }
risk: { max_consecutive_losses: 2, max_daily_loss_usd: 30, max_trades_per_day: 2, max_stop_ticks: 12, max_risk_usd_per_trade: 15 }
quality: { dvs_kill: 0.30, eqs_min: 0.75, dvs_min: 0.80 }
session: { exchange_tz: "America/New_York", session_exit_window_minutes: 5, rth_close_minute: 960, rth_open_minute: 570 }
templates: { k4: { thesis_floor: 0.40, thesis_constraint: "F4", max_minutes: 60, stop_ticks_max: 12, target_ticks: 12, expected_reward_ticks: 12 },
             k3: { thesis_floor: 0.40, thesis_constraint: "F3", max_minutes: 45, stop_ticks_max: 12, target_ticks: 10, expected_reward_ticks: 10 },
             k2: { thesis_floor: 0.40, thesis_constraint: "F2", max_minutes: 30, stop_ticks_max: 10, target_ticks: 8, expected_reward_ticks: 8 },
             k1: { thesis_floor: 0.40, thesis_constraint: "F1", max_minutes: 30, stop_ticks_max: 10, target_ticks: 8, expected_reward_ticks: 8 } }
learning: { quarantine_min_trades_for_win_rate: 10, quarantine_min_trades_for_expectancy: 5, quarantine_consecutive_losses: 2 }
"#,
        );
        let loaded2 = load_layered_yaml(&[reordered.path()]).unwrap();
        assert_eq!(loaded.config_hash, loaded2.config_hash);
    }

    #[test]
    fn layered_override_takes_last_file() {
        let base = write_tmp("risk: { max_trades_per_day: 2 }\nquality: {dvs_min: 0.8, eqs_min: 0.75, dvs_kill: 0.3}\ninstrument: {symbol: MES, tick_size: 0.25, tick_value_usd: 1.25, round_trip_commission_usd: 2.5, min_days_to_expiry: 5}\nsession: {rth_open_minute: 570, rth_close_minute: 960, session_exit_window_minutes: 5, exchange_tz: \"America/New_York\"}\ntemplates: {k1: {expected_reward_ticks: 8, target_ticks: 8, stop_ticks_max: 10, max_minutes: 30, thesis_constraint: F1, thesis_floor: 0.4}, k2: {expected_reward_ticks: 8, target_ticks: 8, stop_ticks_max: 10, max_minutes: 30, thesis_constraint: F2, thesis_floor: 0.4}, k3: {expected_reward_ticks: 10, target_ticks: 10, stop_ticks_max: 12, max_minutes: 45, thesis_constraint: F3, thesis_floor: 0.4}, k4: {expected_reward_ticks: 12, target_ticks: 12, stop_ticks_max: 12, max_minutes: 60, thesis_constraint: F4, thesis_floor: 0.4}}\nlearning: {quarantine_consecutive_losses: 2, quarantine_min_trades_for_expectancy: 5, quarantine_min_trades_for_win_rate: 10}\n");
        let overlay = write_tmp("risk: { max_trades_per_day: 4 }\n");
        let loaded = load_layered_yaml(&[base.path(), overlay.path()]).unwrap();
        assert_eq!(loaded.config.risk.max_trades_per_day, 4);
    }
}
