//! fbot-runtime — C9 per-bar runner.
//!
//! Owns every component's state and drives the ten-step per-bar loop:
//! persist the bar, score quality, compute signals (or skip on warmup),
//! update beliefs, apply the session-exit rule, run the decision engine,
//! pass its output through the permission gate, submit/manage orders, drain
//! broker events, record trade outcomes into the learning loop, and finally
//! apply the kill-switch policy. Single-threaded and cooperative: nothing
//! here spawns a task or holds a lock, one bar in, one bar fully processed,
//! before the next is accepted.

mod kill_switch;
mod open_trade;

pub use kill_switch::KillSwitchCause;

pub use fbot_schemas::ExecutionMode;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use fbot_beliefs::BeliefState;
use fbot_broker::{BrokerAdapter, BrokerEvent};
use fbot_config::RuntimeConfig;
use fbot_decision::{Decision, DecisionInput, RiskSnapshot};
use fbot_execution::{ChildRole, ParentEvent, ParentState};
use fbot_learning::LearningStore;
use fbot_quality::{QualityState, QualityWeights};
use fbot_schemas::{Bar, EventKind, ExecutionMode, Micros, Side};
use fbot_signals::{SessionParams, SignalHistory, SignalVector, SkipReason};
use fbot_trademgr::{ExitReason, HealthInputs, TradeOutcome, TradePosition};
use tracing::{info, warn};

use open_trade::OpenTrade;

pub struct Runner<B: BrokerAdapter> {
    cfg: RuntimeConfig,
    run_id: Uuid,
    symbol: String,
    broker: B,
    audit: fbot_audit::AuditWriter,
    signal_history: SignalHistory,
    quality_state: QualityState,
    quality_weights: QualityWeights,
    beliefs: BeliefState,
    risk_cfg: fbot_risk::RiskConfig,
    risk_state: fbot_risk::RiskState,
    learning: LearningStore,
    open_trade: Option<OpenTrade>,
    kill_switch_on: bool,
    execution_mode: ExecutionMode,
    trades_opened_today: u32,
    consecutive_losses: u32,
    reconcile_mismatch_streak: u32,
    day_id: u32,
    bar_seq: u64,
}

impl<B: BrokerAdapter> Runner<B> {
    pub fn new(
        cfg: RuntimeConfig,
        run_id: Uuid,
        symbol: String,
        broker: B,
        audit: fbot_audit::AuditWriter,
        session_tz: chrono_tz::Tz,
        day_start_equity_usd: f64,
    ) -> Self {
        let session_params = SessionParams {
            tz: session_tz,
            rth_open_minute: cfg.session.rth_open_minute,
            rth_close_minute: cfg.session.rth_close_minute,
            exit_window_minutes: cfg.session.session_exit_window_minutes,
            tick_size: cfg.instrument.tick_size,
        };
        let risk_cfg = fbot_risk::RiskConfig::from_usd(
            cfg.risk.max_risk_usd_per_trade,
            cfg.risk.max_stop_ticks,
            cfg.risk.max_trades_per_day,
            cfg.risk.max_daily_loss_usd,
            cfg.risk.max_consecutive_losses,
        );
        let equity_micros = (day_start_equity_usd * fbot_risk::MICROS_SCALE as f64) as i64;
        Self {
            cfg,
            run_id,
            symbol,
            broker,
            audit,
            signal_history: SignalHistory::new(session_params),
            quality_state: QualityState::new(),
            quality_weights: QualityWeights::default(),
            beliefs: BeliefState::initial(),
            risk_cfg,
            risk_state: fbot_risk::RiskState::new(0, equity_micros, 0),
            learning: LearningStore::new(),
            open_trade: None,
            kill_switch_on: false,
            execution_mode: ExecutionMode::default(),
            trades_opened_today: 0,
            consecutive_losses: 0,
            reconcile_mismatch_streak: 0,
            day_id: 0,
            bar_seq: 0,
        }
    }

    /// Broker reference for scenario-test observability (account snapshot,
    /// open orders).
    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn has_open_trade(&self) -> bool {
        self.open_trade.is_some()
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn trades_opened_today(&self) -> u32 {
        self.trades_opened_today
    }

    pub fn kill_switch_on(&self) -> bool {
        self.kill_switch_on
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    /// Flip to `Live`. This is the only path that lets the permission
    /// gate's `execution_armed` blocker pass; everything else about the
    /// pipeline runs identically in either mode.
    pub fn arm(&mut self) {
        self.execution_mode = ExecutionMode::Live;
    }

    /// Drop back to `Observe`. Distinct from the kill switch: halting here
    /// is an operator choice, not a tripped safety condition, and carries
    /// no audit event of its own beyond the mode change itself.
    pub fn halt(&mut self) {
        self.execution_mode = ExecutionMode::Observe;
    }

    fn append(&mut self, kind: EventKind, payload: serde_json::Value) -> Result<()> {
        self.audit.append(self.run_id, kind, payload)?;
        Ok(())
    }

    fn current_equity_usd(&self) -> Result<f64> {
        Ok(self.broker.get_account_snapshot()?.equity.to_dollars())
    }

    /// Run one closed bar through the full loop.
    pub fn on_bar(&mut self, bar: &Bar, now: DateTime<Utc>) -> Result<()> {
        self.bar_seq += 1;

        // 1. persist BAR.
        self.append(
            EventKind::Bar,
            json!({ "symbol": bar.symbol, "seq": self.bar_seq, "close": bar.close.to_dollars(), "volume": bar.volume }),
        )?;

        // 2. QUALITY.
        let quality = fbot_quality::score(&mut self.quality_state, &self.quality_weights, bar);
        self.append(EventKind::Quality, json!({ "dvs": quality.dvs, "eqs": quality.eqs }))?;

        // 3. SIGNALS, or skip the rest of the bar on warmup.
        let signals = match self.signal_history.compute(bar) {
            Ok(v) => v,
            Err(SkipReason::Warmup) => {
                self.append(EventKind::Signals, json!({ "skipped": true, "reason": "warmup" }))?;
                return Ok(());
            }
        };
        self.append(
            EventKind::Signals,
            json!({
                "momentum_score": signals.momentum_score,
                "volatility_regime_score": signals.volatility_regime_score,
                "session_phase": signals.session_phase.code(),
            }),
        )?;

        // 4. BELIEFS.
        self.beliefs = fbot_beliefs::update(&self.beliefs, &signals, quality.dvs, quality.eqs);
        self.append(
            EventKind::Beliefs,
            json!({
                "f1_effective": self.beliefs.get(fbot_schemas::ConstraintId::F1).effective,
                "f2_effective": self.beliefs.get(fbot_schemas::ConstraintId::F2).effective,
            }),
        )?;

        self.run_risk_tick(bar)?;

        // 5. session-exit rule.
        if self.open_trade.is_some() && signals.minutes_to_close <= self.cfg.session.session_exit_window_minutes {
            self.flatten_open_trade(ExitReason::SessionExit, bar, now)?;
            self.append(EventKind::SessionExitFlatten, json!({ "minutes_to_close": signals.minutes_to_close }))?;
            self.drain_broker_events(bar, now)?;
            self.reconcile_open_trade()?;
            self.apply_kill_switch_policy(&signals, &quality)?;
            return Ok(());
        }

        // 6. decision or trade management.
        if self.open_trade.is_none() {
            self.run_decision(bar, now, &signals, quality.dvs, quality.eqs)?;
        } else {
            self.run_trade_management(bar, now, &signals)?;
        }

        // 8. drain broker events.
        self.drain_broker_events(bar, now)?;
        self.reconcile_open_trade()?;

        // 9. kill-switch policy.
        self.apply_kill_switch_policy(&signals, &quality)?;

        Ok(())
    }

    fn reconcile_open_trade(&mut self) -> Result<()> {
        let Some(open) = &mut self.open_trade else {
            self.reconcile_mismatch_streak = 0;
            return Ok(());
        };
        if open.supervisor.parent.state.is_terminal() {
            return Ok(());
        }
        let orders = self.broker.get_open_orders_snapshot()?;
        let snap = orders.iter().find(|o| o.client_order_id == open.supervisor.client_order_id);
        let outcome = open.supervisor.reconcile(snap);
        match outcome {
            fbot_execution::ReconcileOutcome::Mismatch => self.reconcile_mismatch_streak += 1,
            _ => self.reconcile_mismatch_streak = 0,
        }
        if outcome != fbot_execution::ReconcileOutcome::Clean {
            self.append(EventKind::Reconciliation, json!({ "outcome": format!("{outcome:?}") }))?;
        }
        Ok(())
    }

    /// Feed the current bar's equity into the constitution engine so
    /// `risk_state.halted` reflects live daily-loss/day-rollover state
    /// before the decision and kill-switch steps read it. `trades_today` and
    /// `consecutive_losses_today` are both day-scoped, so a rollover resets
    /// the runner's own counters in step with it.
    fn run_risk_tick(&mut self, bar: &Bar) -> Result<()> {
        let day_id = (bar.ts_close_utc.timestamp() / 86_400) as u32;
        if day_id != self.day_id {
            self.day_id = day_id;
            self.trades_opened_today = 0;
            self.consecutive_losses = 0;
        }
        let equity_usd = self.current_equity_usd()?;
        let equity_micros = (equity_usd * fbot_risk::MICROS_SCALE as f64) as i64;
        let request = if self.open_trade.is_none() {
            fbot_risk::RequestKind::NewOrder
        } else {
            fbot_risk::RequestKind::ModifyOrder
        };
        let input = fbot_risk::RiskInput {
            day_id,
            equity_micros,
            reject_window_id: 0,
            request,
            is_risk_reducing: false,
            planned_risk_micros: 0,
            planned_stop_ticks: 0,
            trades_opened_today: self.trades_opened_today,
            consecutive_losses: self.consecutive_losses,
            kill_switch: None,
        };
        let _ = fbot_risk::evaluate(&self.risk_cfg, &mut self.risk_state, &input);
        Ok(())
    }

    fn run_decision(
        &mut self,
        bar: &Bar,
        now: DateTime<Utc>,
        signals: &SignalVector,
        dvs: f64,
        eqs: f64,
    ) -> Result<()> {
        let equity_usd = self.current_equity_usd()?;
        let risk = RiskSnapshot {
            kill_switch_on: self.kill_switch_on,
            daily_loss_breached: self.risk_state.halted,
            trades_per_day_breached: self.trades_opened_today >= self.cfg.risk.max_trades_per_day,
            consecutive_losses_breached: self.consecutive_losses >= self.cfg.risk.max_consecutive_losses,
        };
        let input = DecisionInput {
            equity_usd,
            last_close: bar.close,
            beliefs: &self.beliefs,
            signals,
            risk,
            learning: &self.learning,
            execution_enabled: !self.kill_switch_on,
            days_to_expiry: self.cfg.instrument.min_days_to_expiry + 30,
            max_risk_usd_per_trade: self.cfg.risk.max_risk_usd_per_trade,
            tick_value_usd: self.cfg.instrument.tick_value_usd,
        };
        let decision = fbot_decision::decide(&input, dvs, eqs);
        self.append(EventKind::Decision, json!({ "outcome": format!("{decision:?}") }))?;

        let Decision::Enter(intent) = decision else { return Ok(()) };
        self.append(
            EventKind::OrderIntent,
            json!({ "template_id": format!("{:?}", intent.template_id), "side": format!("{:?}", intent.side), "size": intent.size }),
        )?;

        let permission = fbot_gate::PermissionInput {
            kill_switch_active: self.kill_switch_on,
            broker_session_ready: self.broker.is_connected(),
            broker_account_ready: true,
            execution_armed: self.execution_mode == ExecutionMode::Live,
            data_quality_critical: dvs < self.cfg.quality.dvs_kill,
            data_quality_soft_warn: dvs < self.cfg.quality.dvs_min || eqs < self.cfg.quality.eqs_min,
            days_to_expiry: input.days_to_expiry,
            min_days_to_expiry: self.cfg.instrument.min_days_to_expiry,
        };
        let verdict = fbot_gate::evaluate(&permission);
        if !verdict.is_permitted() {
            self.append(
                EventKind::ReadinessSnapshot,
                json!({ "permitted": false, "blocked_by": verdict.blocked_by.map(|b| b.to_string()) }),
            )?;
            return Ok(());
        }

        self.open_new_trade(intent, signals, bar, now)?;
        Ok(())
    }

    fn run_trade_management(&mut self, bar: &Bar, now: DateTime<Utc>, signals: &SignalVector) -> Result<()> {
        let Some(open) = &self.open_trade else { return Ok(()) };
        let health = HealthInputs {
            stop_state: open.supervisor.stop.state,
            stop_rearm_failures: open.supervisor.stop.rearm_failures,
            target_state: open.supervisor.target.state,
            target_rearm_failures: open.supervisor.target.rearm_failures,
        };
        let action = fbot_trademgr::tick(&open.position, now, &self.beliefs, signals, &health);
        match action {
            fbot_trademgr::TradeManagerAction::Hold => {}
            fbot_trademgr::TradeManagerAction::RequestReArm(role) => self.rearm_child(role, bar)?,
            fbot_trademgr::TradeManagerAction::Flatten(reason) => self.flatten_open_trade(reason, bar, now)?,
        }
        Ok(())
    }

    fn rearm_child(&mut self, role: ChildRole, bar: &Bar) -> Result<()> {
        let Some(open) = &mut self.open_trade else { return Ok(()) };
        let client_order_id = match role {
            ChildRole::Stop => open.stop_client_order_id.clone(),
            ChildRole::Target => open.target_client_order_id.clone(),
        };
        let price = match role {
            ChildRole::Stop => open.stop_price(self.cfg.instrument.tick_size),
            ChildRole::Target => open.target_price(self.cfg.instrument.tick_size),
        };
        let exit_side = open.position.side.opposite();
        let result = match role {
            ChildRole::Stop => self.broker.submit_stop_order(&client_order_id, &bar.symbol, exit_side, open.position.size as i64, price),
            ChildRole::Target => self.broker.submit_target_order(&client_order_id, &bar.symbol, exit_side, open.position.size as i64, price),
        };
        let open = self.open_trade.as_mut().unwrap();
        let child = match role {
            ChildRole::Stop => &mut open.supervisor.stop,
            ChildRole::Target => &mut open.supervisor.target,
        };
        if result.is_err() {
            child.record_rearm_failure();
        }
        Ok(())
    }

    fn open_new_trade(&mut self, intent: fbot_decision::OrderIntent, signals: &SignalVector, bar: &Bar, now: DateTime<Utc>) -> Result<()> {
        let intent_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}-{}", self.run_id, self.bar_seq).as_bytes());
        let supervisor = fbot_execution::ExecutionSupervisor::from_intent(&intent, self.run_id, intent_id);
        let client_order_id = supervisor.client_order_id.clone();

        self.broker
            .submit_limit_order(&client_order_id, &bar.symbol, intent.side, intent.size as i64, intent.entry_limit)?;

        let spec = fbot_decision::spec_for(intent.template_id);
        let position = TradePosition {
            client_order_id: client_order_id.clone(),
            template_id: intent.template_id,
            thesis_constraint: spec.thesis_constraint,
            side: intent.side,
            entry_price: intent.entry_limit,
            entry_time: now,
            size: intent.size,
            max_minutes: spec.max_minutes,
            vol_exit_atr_multiple: spec.vol_exit_atr_multiple,
            thesis_floor: spec.thesis_floor,
            atr_at_entry: signals.atr14,
            entry_regime: intent.regime,
            entry_tod: intent.tod,
        };

        let stop_client_order_id = format!("{client_order_id}_stop");
        let target_client_order_id = format!("{client_order_id}_target");

        let mut open = OpenTrade::new(supervisor, position, stop_client_order_id, target_client_order_id, intent.stop_ticks, intent.target_ticks);
        open.supervisor.submit(now.timestamp_millis())?;
        self.open_trade = Some(open);
        self.trades_opened_today += 1;
        info!(client_order_id, template = ?intent.template_id, side = ?intent.side, "opened trade");
        Ok(())
    }

    fn flatten_open_trade(&mut self, reason: ExitReason, bar: &Bar, now: DateTime<Utc>) -> Result<()> {
        let Some(open) = &mut self.open_trade else { return Ok(()) };
        if open.supervisor.parent.state != ParentState::Filled {
            // Entry never filled; just cancel it, nothing to close out.
            self.broker.cancel_order(&open.supervisor.client_order_id)?;
            self.open_trade = None;
            return Ok(());
        }
        let flatten_id = format!("{}_flatten", open.supervisor.client_order_id);
        self.broker.cancel_order(&open.stop_client_order_id)?;
        self.broker.cancel_order(&open.target_client_order_id)?;
        self.broker
            .submit_flatten_order(&flatten_id, &bar.symbol, open.position.side.opposite(), open.position.size as i64)?;
        open.flatten_client_order_id = Some(flatten_id);
        open.pending_exit_reason = Some(reason);
        let _ = now;
        Ok(())
    }

    fn drain_broker_events(&mut self, bar: &Bar, now: DateTime<Utc>) -> Result<()> {
        let events = self.broker.drain_events();
        for ev in events {
            match ev {
                BrokerEvent::Ack { client_order_id, .. } => {
                    self.handle_ack(&client_order_id)?;
                }
                BrokerEvent::Fill { client_order_id, fill_qty, fill_price, fill_seq, .. } => {
                    self.handle_fill(&client_order_id, fill_qty, fill_price, fill_seq, bar, now)?;
                }
                BrokerEvent::Reject { client_order_id, reason } => {
                    self.append(EventKind::OrderAck, json!({ "client_order_id": client_order_id, "rejected": true, "reason": reason }))?;
                }
                BrokerEvent::Disconnected | BrokerEvent::Reconnected | BrokerEvent::Bar(_) => {}
            }
        }
        Ok(())
    }

    fn handle_ack(&mut self, client_order_id: &str) -> Result<()> {
        let Some(open) = &mut self.open_trade else { return Ok(()) };
        if client_order_id == open.supervisor.client_order_id {
            let event_id = format!("ack-{client_order_id}");
            open.supervisor.on_parent_event(ParentEvent::Ack, &event_id)?;
        }
        self.append(EventKind::OrderAck, json!({ "client_order_id": client_order_id }))
    }

    fn handle_fill(&mut self, client_order_id: &str, fill_qty: i64, fill_price: Micros, fill_seq: u64, bar: &Bar, now: DateTime<Utc>) -> Result<()> {
        let event_id = format!("fill-{client_order_id}-{fill_seq}");
        let Some(open) = &mut self.open_trade else { return Ok(()) };

        if client_order_id == open.supervisor.client_order_id {
            open.supervisor.on_parent_event(ParentEvent::Fill { delta_qty: fill_qty }, &event_id)?;
            if open.supervisor.parent.state == ParentState::Filled {
                open.position.entry_price = fill_price;
                let stop_price = open.stop_price(self.cfg.instrument.tick_size);
                let target_price = open.target_price(self.cfg.instrument.tick_size);
                let exit_side = open.position.side.opposite();
                let size = open.position.size as i64;
                let stop_id = open.stop_client_order_id.clone();
                let target_id = open.target_client_order_id.clone();
                self.broker.submit_stop_order(&stop_id, &bar.symbol, exit_side, size, stop_price)?;
                self.broker.submit_target_order(&target_id, &bar.symbol, exit_side, size, target_price)?;
            }
            self.append(EventKind::Fill, json!({ "client_order_id": client_order_id, "fill_qty": fill_qty, "fill_price": fill_price.to_dollars() }))?;
            return Ok(());
        }

        if client_order_id == open.stop_client_order_id {
            let sibling = open.supervisor.on_child_fill(ChildRole::Stop, &event_id)?;
            self.broker.cancel_order(&open.target_client_order_id)?;
            open.supervisor.cancel_sibling(sibling, &format!("{event_id}-cancel"))?;
            self.close_trade(fill_price, ExitReason::StopHit, now)?;
            return Ok(());
        }

        if client_order_id == open.target_client_order_id {
            let sibling = open.supervisor.on_child_fill(ChildRole::Target, &event_id)?;
            self.broker.cancel_order(&open.stop_client_order_id)?;
            open.supervisor.cancel_sibling(sibling, &format!("{event_id}-cancel"))?;
            self.close_trade(fill_price, ExitReason::TargetHit, now)?;
            return Ok(());
        }

        if open.flatten_client_order_id.as_deref() == Some(client_order_id) {
            let reason = open.pending_exit_reason.unwrap_or(ExitReason::KillSwitchFlatten);
            self.close_trade(fill_price, reason, now)?;
        }
        Ok(())
    }

    fn close_trade(&mut self, exit_price: Micros, reason: ExitReason, now: DateTime<Utc>) -> Result<()> {
        let Some(open) = self.open_trade.take() else { return Ok(()) };
        let outcome: TradeOutcome = fbot_trademgr::compute_outcome(
            &open.position,
            exit_price,
            now,
            self.cfg.instrument.tick_size,
            self.cfg.instrument.tick_value_usd,
            reason,
        );

        if outcome.is_win {
            self.consecutive_losses = 0;
        } else {
            self.consecutive_losses += 1;
        }
        info!(
            template = ?outcome.template_id,
            net_pnl_usd = outcome.net_pnl_usd,
            is_win = outcome.is_win,
            exit_reason = ?outcome.exit_reason,
            "trade closed"
        );

        self.append(
            EventKind::TradeExit,
            json!({
                "template_id": format!("{:?}", outcome.template_id),
                "net_pnl_usd": outcome.net_pnl_usd,
                "is_win": outcome.is_win,
                "exit_reason": format!("{:?}", outcome.exit_reason),
            }),
        )?;

        if let Some(update) = self.learning.record(&outcome) {
            self.append(
                EventKind::LearningUpdate,
                json!({
                    "from_state": format!("{:?}", update.from_state),
                    "to_state": format!("{:?}", update.to_state),
                    "trigger": format!("{:?}", update.trigger),
                }),
            )?;
        }
        if self.learning.should_persist() {
            let _ = self.learning.export_state()?;
            self.learning.mark_persisted();
        }
        Ok(())
    }

    fn apply_kill_switch_policy(&mut self, signals: &SignalVector, quality: &fbot_quality::QualityScore) -> Result<()> {
        let account = self.broker.get_account_snapshot()?;
        let cause = kill_switch::evaluate(
            quality.dvs,
            self.cfg.quality.dvs_kill,
            account.buying_power.to_dollars(),
            self.reconcile_mismatch_streak,
            self.risk_state.halted,
        );
        let _ = signals;
        let Some(cause) = cause else { return Ok(()) };
        if self.kill_switch_on {
            return Ok(());
        }
        self.kill_switch_on = true;
        warn!(?cause, "kill switch armed");
        self.append(EventKind::KillSwitch, json!({ "cause": format!("{cause:?}") }))?;
        if let Some(open) = &self.open_trade {
            if open.supervisor.parent.state == ParentState::Filled {
                let client_order_id = open.supervisor.client_order_id.clone();
                let side = open.position.side.opposite();
                let size = open.position.size as i64;
                let flatten_id = format!("{client_order_id}_killflatten");
                self.broker.submit_flatten_order(&flatten_id, &self.symbol, side, size)?;
                let open = self.open_trade.as_mut().unwrap();
                open.flatten_client_order_id = Some(flatten_id);
                open.pending_exit_reason = Some(ExitReason::KillSwitchFlatten);
            } else {
                self.broker.cancel_order(&open.supervisor.client_order_id)?;
                self.open_trade = None;
            }
        }
        Ok(())
    }
}
