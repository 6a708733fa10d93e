//! One trade's execution supervisor: a parent order plus its STOP/TARGET
//! OCO children. Owns no transport; callers (the broker adapter glue in
//! `fbot-runtime`) perform the actual I/O and feed results back in through
//! `on_*` methods. This keeps the state machine deterministic and testable
//! without a live broker.

use fbot_schemas::{BrokerOrderSnapshot, BrokerOrderState};

use crate::child::{oco_cancel_event, ChildEvent, ChildOrder, ChildRole};
use crate::parent::{ParentEvent, ParentOrder, ParentState};

/// Entry orders not yet acked/filled are canceled after this many ms.
pub const ENTRY_TTL_MS: i64 = 90_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Clean,
    /// Broker has no record of a locally tracked non-terminal order.
    Mismatch,
    /// Broker's position/fill state diverged from local bookkeeping; the
    /// supervisor adopted the broker's authoritative fill count.
    ReconciledToBroker,
}

#[derive(Debug, Clone)]
pub struct ExecutionSupervisor {
    pub client_order_id: String,
    pub parent: ParentOrder,
    pub stop: ChildOrder,
    pub target: ChildOrder,
    pub entry_submitted_at_ms: Option<i64>,
}

impl ExecutionSupervisor {
    pub fn new(client_order_id: impl Into<String>, intended_size: i64) -> Self {
        let client_order_id = client_order_id.into();
        Self {
            parent: ParentOrder::new(client_order_id.clone(), intended_size),
            client_order_id,
            stop: ChildOrder::new(ChildRole::Stop),
            target: ChildOrder::new(ChildRole::Target),
            entry_submitted_at_ms: None,
        }
    }

    /// Build a supervisor for a freshly decided `OrderIntent`, deriving its
    /// `client_order_id` from `(run_id, intent_id)` per the idempotent
    /// submission contract.
    pub fn from_intent(
        intent: &fbot_decision::OrderIntent,
        run_id: uuid::Uuid,
        intent_id: uuid::Uuid,
    ) -> Self {
        let client_order_id = crate::client_order_id::derive(run_id, intent_id);
        Self::new(client_order_id, intent.size as i64)
    }

    /// Transition `CREATED -> SUBMITTED`. Idempotent: a second call on an
    /// already-submitted parent is a silent no-op, per the same dedup
    /// mechanism `apply` uses for broker events.
    pub fn submit(&mut self, now_ms: i64) -> Result<(), crate::parent::TransitionError> {
        if self.parent.state != ParentState::Created {
            return Ok(());
        }
        self.parent.apply(&ParentEvent::Submitted, Some("submit"))?;
        self.entry_submitted_at_ms = Some(now_ms);
        Ok(())
    }

    pub fn on_parent_event(
        &mut self,
        event: ParentEvent,
        event_id: &str,
    ) -> Result<(), crate::parent::TransitionError> {
        let became_filled = matches!(event, ParentEvent::Fill { .. });
        self.parent.apply(&event, Some(event_id))?;
        if became_filled && self.parent.state == ParentState::Filled {
            let _ = self.stop.apply(&ChildEvent::Submitted, Some(&format!("{event_id}-stop")));
            let _ = self.target.apply(&ChildEvent::Submitted, Some(&format!("{event_id}-target")));
        }
        Ok(())
    }

    /// A child leg filled. Returns the sibling role that must now be
    /// canceled to preserve the OCO invariant.
    pub fn on_child_fill(
        &mut self,
        role: ChildRole,
        event_id: &str,
    ) -> Result<ChildRole, crate::child::TransitionError> {
        let (filled, sibling) = match role {
            ChildRole::Stop => (&mut self.stop, ChildRole::Target),
            ChildRole::Target => (&mut self.target, ChildRole::Stop),
        };
        filled.apply(&ChildEvent::Fill, Some(event_id))?;
        Ok(sibling)
    }

    pub fn cancel_sibling(&mut self, sibling: ChildRole, event_id: &str) -> Result<(), crate::child::TransitionError> {
        let child = match sibling {
            ChildRole::Stop => &mut self.stop,
            ChildRole::Target => &mut self.target,
        };
        child.apply(&oco_cancel_event(), Some(event_id))
    }

    /// Returns `true` if the entry has been outstanding past its TTL and
    /// should be canceled by the caller.
    pub fn entry_ttl_expired(&self, now_ms: i64) -> bool {
        matches!(self.parent.state, ParentState::Submitted | ParentState::Acked)
            && self
                .entry_submitted_at_ms
                .map(|t| now_ms - t >= ENTRY_TTL_MS)
                .unwrap_or(false)
    }

    /// Reconcile against the broker's authoritative snapshot for this
    /// order. Broker truth always wins: a filled-qty mismatch is adopted
    /// silently, a missing non-terminal order is flagged `Mismatch`.
    pub fn reconcile(&mut self, broker_order: Option<&BrokerOrderSnapshot>) -> ReconcileOutcome {
        match broker_order {
            None if !self.parent.state.is_terminal() => {
                self.parent.state = ParentState::Error;
                ReconcileOutcome::Mismatch
            }
            None => ReconcileOutcome::Clean,
            Some(snap) => {
                if snap.filled_qty != self.parent.filled_qty {
                    self.parent.filled_qty = snap.filled_qty;
                    if matches!(snap.state, BrokerOrderState::Filled) {
                        self.parent.state = ParentState::Filled;
                    }
                    ReconcileOutcome::ReconciledToBroker
                } else {
                    ReconcileOutcome::Clean
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_schemas::{BrokerOrderKind, Side};

    fn snapshot(client_order_id: &str, filled_qty: i64, state: BrokerOrderState) -> BrokerOrderSnapshot {
        BrokerOrderSnapshot {
            broker_order_id: format!("b-{client_order_id}"),
            client_order_id: client_order_id.to_string(),
            symbol: "MES".to_string(),
            side: Side::Buy,
            kind: BrokerOrderKind::Limit,
            state,
            qty: 1,
            filled_qty,
        }
    }

    #[test]
    fn submit_is_idempotent() {
        let mut s = ExecutionSupervisor::new("co-1", 1);
        s.submit(0).unwrap();
        s.submit(100).unwrap();
        assert_eq!(s.entry_submitted_at_ms, Some(0));
    }

    #[test]
    fn full_fill_arms_both_children() {
        let mut s = ExecutionSupervisor::new("co-1", 1);
        s.submit(0).unwrap();
        s.on_parent_event(ParentEvent::Ack, "ack").unwrap();
        s.on_parent_event(ParentEvent::Fill { delta_qty: 1 }, "fill").unwrap();
        assert_eq!(s.parent.state, ParentState::Filled);
        assert_eq!(s.stop.state, crate::child::ChildState::Working);
        assert_eq!(s.target.state, crate::child::ChildState::Working);
    }

    #[test]
    fn oco_cancels_sibling_on_fill() {
        let mut s = ExecutionSupervisor::new("co-1", 1);
        s.submit(0).unwrap();
        s.on_parent_event(ParentEvent::Ack, "ack").unwrap();
        s.on_parent_event(ParentEvent::Fill { delta_qty: 1 }, "fill").unwrap();
        let sibling = s.on_child_fill(ChildRole::Stop, "stop-fill").unwrap();
        assert_eq!(sibling, ChildRole::Target);
        s.cancel_sibling(sibling, "target-cancel").unwrap();
        assert_eq!(s.target.state, crate::child::ChildState::Canceled);
    }

    #[test]
    fn entry_ttl_expires_after_90s() {
        let mut s = ExecutionSupervisor::new("co-1", 1);
        s.submit(0).unwrap();
        assert!(!s.entry_ttl_expired(89_999));
        assert!(s.entry_ttl_expired(90_000));
    }

    #[test]
    fn missing_broker_order_is_a_mismatch() {
        let mut s = ExecutionSupervisor::new("co-1", 1);
        s.submit(0).unwrap();
        let outcome = s.reconcile(None);
        assert_eq!(outcome, ReconcileOutcome::Mismatch);
        assert_eq!(s.parent.state, ParentState::Error);
    }

    #[test]
    fn broker_fill_count_is_adopted() {
        let mut s = ExecutionSupervisor::new("co-1", 1);
        s.submit(0).unwrap();
        s.on_parent_event(ParentEvent::Ack, "ack").unwrap();
        let snap = snapshot("co-1", 1, BrokerOrderState::Filled);
        let outcome = s.reconcile(Some(&snap));
        assert_eq!(outcome, ReconcileOutcome::ReconciledToBroker);
        assert_eq!(s.parent.state, ParentState::Filled);
    }
}
