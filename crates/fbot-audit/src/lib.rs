//! Append-only audit writer. Writes JSON Lines (one event per line).
//! Optional hash chain: each event can include hash_prev + hash_self.
//!
//! `topic` is always `fbot_schemas::EventKind`, giving every line a closed,
//! typed discriminator instead of a free-form string; `payload` stays a
//! generic [`serde_json::Value`] so the runner's per-variant typed event
//! bodies can serialize into it without this crate depending on every
//! domain crate upstream of it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fbot_schemas::EventKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    /// Monotonically increasing counter feeding `event_id` derivation.
    /// Starts at 0 and increments on every `append` call. When resuming an
    /// existing log after a restart, restore with `set_seq` alongside
    /// `set_last_hash`.
    seq: u64,
}

impl AuditWriter {
    /// Creates the audit writer and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Set last hash explicitly (e.g. after reading the last line on restart).
    pub fn set_last_hash(&mut self, last_hash: Option<String>) {
        self.last_hash = last_hash;
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Set the sequence counter when resuming an existing log after restart.
    /// Pass the number of events already written. Must be paired with
    /// `set_last_hash` for correct restart semantics.
    pub fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one event.
    pub fn append(&mut self, run_id: Uuid, kind: EventKind, payload: Value) -> Result<AuditEvent> {
        let ts_utc = Utc::now();
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq);
        self.seq += 1;

        let mut ev = AuditEvent {
            event_id,
            run_id,
            ts_utc,
            kind,
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();
            let self_hash = compute_event_hash(&ev)?;
            ev.hash_self = Some(self_hash.clone());
            self.last_hash = Some(self_hash);
        }

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;

        Ok(ev)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub kind: EventKind,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Deterministic event-id derivation. **No RNG.** Uses `Uuid::new_v5` over
/// the chain state, canonical payload, and sequence number so that replaying
/// the same inputs always yields the same id.
fn derive_event_id(last_hash: Option<&str>, payload: &Value, seq: u64) -> Uuid {
    let sorted = sort_keys(payload);
    let payload_json = serde_json::to_string(&sorted).expect("json serialization must not fail");
    let data = format!(
        "fbot-audit.event.v1|{}|{}|{}",
        last_hash.unwrap_or(""),
        seq,
        payload_json
    );
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, data.as_bytes())
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes()).context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Canonicalize by sorting keys recursively and emitting compact JSON. One
/// event == one JSON line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify failed")
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

/// Hash chain is computed from the canonical JSON of the event WITHOUT
/// hash_self, to avoid self-reference.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Verify the hash chain integrity of an audit log file.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same as [`verify_hash_chain`] but operates on an in-memory `&str`. Useful
/// for tests and for the daemon's startup resume path.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: AuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;

        line_count += 1;

        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        if let Some(ref claimed_hash) = ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed_hash != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed_hash, recomputed
                    ),
                });
            }
        }

        prev_hash = ev.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(suffix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "fbot_audit_test_{}_{}_{}",
            suffix,
            std::process::id(),
            Uuid::new_v4().as_simple()
        ))
    }

    #[test]
    fn untampered_chain_verifies_valid() {
        let path = temp_path("untampered");
        let run_id = Uuid::new_v4();
        {
            let mut w = AuditWriter::new(&path, true).unwrap();
            for i in 0..5 {
                w.append(run_id, EventKind::Bar, json!({"index": i})).unwrap();
            }
        }
        let result = verify_hash_chain(&path).unwrap();
        assert_eq!(result, VerifyResult::Valid { lines: 5 });
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn tampered_payload_detected() {
        let path = temp_path("tampered");
        let run_id = Uuid::new_v4();
        {
            let mut w = AuditWriter::new(&path, true).unwrap();
            for i in 0..5 {
                w.append(run_id, EventKind::Decision, json!({"index": i, "data": format!("p{i}")}))
                    .unwrap();
            }
        }
        {
            let content = std::fs::read_to_string(&path).unwrap();
            let mut lines: Vec<&str> = content.lines().collect();
            let mut ev: Value = serde_json::from_str(lines[2]).unwrap();
            ev["payload"]["data"] = json!("TAMPERED");
            let tampered = serde_json::to_string(&ev).unwrap();
            lines[2] = &tampered;
            std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        }
        let result = verify_hash_chain(&path).unwrap();
        match result {
            VerifyResult::Broken { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("hash_self mismatch"));
            }
            VerifyResult::Valid { .. } => panic!("tampered chain should not verify"),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn deleted_line_breaks_chain() {
        let path = temp_path("deleted");
        let run_id = Uuid::new_v4();
        {
            let mut w = AuditWriter::new(&path, true).unwrap();
            for i in 0..5 {
                w.append(run_id, EventKind::Fill, json!({"index": i})).unwrap();
            }
        }
        {
            let content = std::fs::read_to_string(&path).unwrap();
            let lines: Vec<&str> = content.lines().collect();
            let kept: Vec<&str> = lines
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != 2)
                .map(|(_, l)| *l)
                .collect();
            std::fs::write(&path, kept.join("\n") + "\n").unwrap();
        }
        let result = verify_hash_chain(&path).unwrap();
        match result {
            VerifyResult::Broken { reason, .. } => assert!(reason.contains("hash_prev mismatch")),
            VerifyResult::Valid { .. } => panic!("chain with deleted line should not verify"),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_log_is_valid() {
        let path = temp_path("empty");
        std::fs::write(&path, "").unwrap();
        let result = verify_hash_chain(&path).unwrap();
        assert_eq!(result, VerifyResult::Valid { lines: 0 });
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn no_hash_chain_events_have_no_hashes() {
        let path = temp_path("nochain");
        let run_id = Uuid::new_v4();
        let mut w = AuditWriter::new(&path, false).unwrap();
        let ev = w.append(run_id, EventKind::Bar, json!({"ok": true})).unwrap();
        assert!(ev.hash_prev.is_none());
        assert!(ev.hash_self.is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn event_id_is_deterministic_given_same_inputs() {
        let a = derive_event_id(Some("abc"), &json!({"x": 1}), 3);
        let b = derive_event_id(Some("abc"), &json!({"x": 1}), 3);
        assert_eq!(a, b);
        let c = derive_event_id(Some("abc"), &json!({"x": 2}), 3);
        assert_ne!(a, c);
    }
}
