//! Shared daemon state: the broadcast bus, build metadata, and the armed/
//! status flags the routes read and mutate. Scoped to this core's
//! operational surface: mode, manual kill-switch trip, readiness query —
//! no trading read endpoints, no dev snapshot injection.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::interval;

use fbot_broker::InMemoryBroker;
use fbot_runtime::Runner;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Point-in-time view of the runner's operational state. Unlike the
/// per-bar `READINESS_SNAPSHOT` event (owned by `fbot-runtime`'s audit log),
/// this is the control plane's own coarse summary, refreshed on every poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "idle" | "running" | "halted"
    pub state: String,
    pub armed: bool,
    pub kill_switch_on: bool,
    pub notes: Option<String>,
}

impl StatusSnapshot {
    pub fn boot() -> Self {
        Self {
            daemon_uptime_secs: 0,
            state: "idle".to_string(),
            armed: false,
            kill_switch_on: false,
            notes: Some("boot: fail-closed, armed=false".to_string()),
        }
    }
}

pub struct AppState {
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub status: RwLock<StatusSnapshot>,
    /// The single runner this process owns. Routes that read it treat
    /// `None` as not-ready rather than panicking.
    pub runner: Mutex<Option<Runner<InMemoryBroker>>>,
}

impl AppState {
    pub fn new(runner: Option<Runner<InMemoryBroker>>) -> Self {
        let (bus, _rx) = broadcast::channel(256);
        Self {
            bus,
            build: BuildInfo { service: "fbot-daemon", version: env!("CARGO_PKG_VERSION") },
            // fail-closed boot: never armed by default, an explicit
            // POST /v1/arm is required before readiness can report true.
            status: RwLock::new(StatusSnapshot::boot()),
            runner: Mutex::new(runner),
        }
    }
}

pub fn uptime_secs() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_secs()
}

pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, period: Duration) {
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            let ts_millis = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis });
        }
    });
}
