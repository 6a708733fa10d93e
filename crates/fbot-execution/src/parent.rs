//! Parent order state machine: explicit legal-transition table plus
//! idempotent replay via a dedup set of applied event ids.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentState {
    Created,
    Submitted,
    Acked,
    Filled,
    Canceled,
    Error,
}

impl ParentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ParentState::Filled | ParentState::Canceled | ParentState::Error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParentEvent {
    Submitted,
    Ack,
    PartialFill { delta_qty: i64 },
    Fill { delta_qty: i64 },
    CancelRequest,
    CancelAck,
    EntryTtlExpired,
    BrokerReject,
    InvalidPriceFill,
    ReconciliationMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ParentState,
    pub event: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal parent-order transition: {:?} + {}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

#[derive(Debug, Clone)]
pub struct ParentOrder {
    pub client_order_id: String,
    pub intended_size: i64,
    pub filled_qty: i64,
    pub state: ParentState,
    applied: HashSet<String>,
}

impl ParentOrder {
    pub fn new(client_order_id: impl Into<String>, intended_size: i64) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            intended_size,
            filled_qty: 0,
            state: ParentState::Created,
            applied: HashSet::new(),
        }
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_qty >= self.intended_size
    }

    pub fn apply(&mut self, event: &ParentEvent, event_id: Option<&str>) -> Result<(), TransitionError> {
        if let Some(id) = event_id {
            if self.applied.contains(id) {
                return Ok(());
            }
        }

        self.do_transition(event)?;

        if let Some(id) = event_id {
            self.applied.insert(id.to_string());
        }
        Ok(())
    }

    fn do_transition(&mut self, event: &ParentEvent) -> Result<(), TransitionError> {
        use ParentEvent::*;
        use ParentState::*;

        match (self.state, event) {
            (Created, Submitted) => self.state = ParentState::Submitted,

            (Submitted, Ack) => self.state = Acked,
            // Idempotent re-ack.
            (Acked, Ack) => {}

            (Submitted | Acked, PartialFill { delta_qty }) => {
                self.filled_qty += delta_qty;
            }
            (Submitted | Acked, Fill { delta_qty }) => {
                self.filled_qty += delta_qty;
                if self.is_fully_filled() {
                    self.state = Filled;
                }
            }
            // Duplicate fill on an already-filled parent is a silent no-op;
            // the caller's fill-id dedup should already have caught this.
            (Filled, Fill { .. } | PartialFill { .. }) => {}

            (Submitted | Acked, CancelRequest | EntryTtlExpired) => {}
            (Submitted | Acked, CancelAck) => self.state = Canceled,

            (_, BrokerReject) => self.state = Error,
            (_, InvalidPriceFill) => self.state = Error,
            (_, ReconciliationMismatch) => self.state = Error,

            (state, ev) => {
                return Err(TransitionError { from: state, event: format!("{ev:?}") });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_filled() {
        let mut o = ParentOrder::new("co-1", 2);
        o.apply(&ParentEvent::Submitted, Some("e1")).unwrap();
        o.apply(&ParentEvent::Ack, Some("e2")).unwrap();
        o.apply(&ParentEvent::Fill { delta_qty: 2 }, Some("e3")).unwrap();
        assert_eq!(o.state, ParentState::Filled);
        assert!(o.state.is_terminal());
    }

    #[test]
    fn duplicate_event_id_is_noop() {
        let mut o = ParentOrder::new("co-1", 2);
        o.apply(&ParentEvent::Submitted, Some("e1")).unwrap();
        o.apply(&ParentEvent::Ack, Some("e2")).unwrap();
        o.apply(&ParentEvent::Fill { delta_qty: 1 }, Some("e3")).unwrap();
        o.apply(&ParentEvent::Fill { delta_qty: 1 }, Some("e3")).unwrap();
        assert_eq!(o.filled_qty, 1, "replayed fill must not double-credit");
    }

    #[test]
    fn reject_from_any_state_goes_to_error() {
        let mut o = ParentOrder::new("co-1", 2);
        o.apply(&ParentEvent::Submitted, Some("e1")).unwrap();
        o.apply(&ParentEvent::BrokerReject, Some("e2")).unwrap();
        assert_eq!(o.state, ParentState::Error);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut o = ParentOrder::new("co-1", 2);
        let err = o.apply(&ParentEvent::Ack, Some("e1")).unwrap_err();
        assert_eq!(err.from, ParentState::Created);
    }
}
