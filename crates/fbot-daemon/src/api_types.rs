//! Request/response bodies for the daemon's HTTP surface. No business logic.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Response body when a route is refused because execution is not armed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRefusedResponse {
    pub error: String,
    pub gate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmResponse {
    pub armed: bool,
}

/// Composite of the permission gate's reachable-from-here conditions:
/// execution armed, kill switch clear, broker connected. A real per-bar
/// `READINESS_SNAPSHOT` (computed inside `fbot-runtime`) also folds in DVS/EQS
/// and days-to-expiry, which this control-plane endpoint does not see without
/// a live bar in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub armed: bool,
    pub kill_switch_on: bool,
    pub broker_connected: bool,
    pub ready: bool,
}
