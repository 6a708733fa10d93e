//! Axum router and HTTP handlers for fbot-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Covers this core's operational surface: health,
//! status, SSE stream, arm/halt, readiness. No trading read endpoints, no
//! dev snapshot injection — this runner has no live broker feed to
//! snapshot.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use fbot_broker::BrokerAdapter;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{ArmResponse, HealthResponse, ReadinessResponse},
    state::{uptime_secs, AppState, BusMsg},
};

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/arm", post(arm))
        .route("/v1/halt", post(halt))
        .route("/v1/readiness", get(readiness))
        .with_state(state)
}

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();

    {
        let runner = st.runner.lock().await;
        if let Some(r) = runner.as_ref() {
            snap.kill_switch_on = r.kill_switch_on();
            snap.armed = r.execution_mode() == fbot_runtime::ExecutionMode::Live;
        }
    }

    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

/// Arm execution. Fail-closed boot means this is the only way `readiness`
/// can ever report `ready: true`. Flips the runner's own `ExecutionMode`,
/// not just this status flag, so the permission gate's `execution_armed`
/// blocker actually passes.
pub(crate) async fn arm(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    {
        let mut runner = st.runner.lock().await;
        if let Some(r) = runner.as_mut() {
            r.arm();
        }
    }

    let mut s = st.status.write().await;
    s.armed = true;
    s.state = "running".to_string();
    s.notes = Some("armed".to_string());
    s.daemon_uptime_secs = uptime_secs();
    let snap = s.clone();
    drop(s);

    info!("armed");
    let _ = st.bus.send(BusMsg::Status(snap));
    (StatusCode::OK, Json(ArmResponse { armed: true }))
}

/// Halt is sticky: once set, only a fresh `arm` clears it.
pub(crate) async fn halt(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    {
        let mut runner = st.runner.lock().await;
        if let Some(r) = runner.as_mut() {
            r.halt();
        }
    }

    let mut s = st.status.write().await;
    s.armed = false;
    s.state = "halted".to_string();
    s.notes = Some("HALT asserted".to_string());
    s.daemon_uptime_secs = uptime_secs();
    let snap = s.clone();
    drop(s);

    info!("halted");
    let _ = st.bus.send(BusMsg::Status(snap));
    (StatusCode::OK, Json(ArmResponse { armed: false }))
}

pub(crate) async fn readiness(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let (armed, kill_switch_on, broker_connected) = {
        let runner = st.runner.lock().await;
        match runner.as_ref() {
            Some(r) => (r.execution_mode() == fbot_runtime::ExecutionMode::Live, r.kill_switch_on(), r.broker().is_connected()),
            None => (false, false, false),
        }
    };

    let ready = armed && !kill_switch_on && broker_connected;

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            armed,
            kill_switch_on,
            broker_connected,
            ready,
        }),
    )
}

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None,
        }
    })
}
