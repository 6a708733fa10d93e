//! Child order (STOP or TARGET leg) state machine, plus the OCO invariant:
//! once one child fills, the supervisor must cancel its sibling.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildRole {
    Stop,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildState {
    Created,
    Working,
    Filled,
    Canceled,
}

impl ChildState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChildState::Filled | ChildState::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    Submitted,
    Fill,
    CancelAck,
    ReArm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ChildState,
    pub event: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal child-order transition: {:?} + {}", self.from, self.event)
    }
}
impl std::error::Error for TransitionError {}

#[derive(Debug, Clone)]
pub struct ChildOrder {
    pub role: ChildRole,
    pub state: ChildState,
    /// Consecutive failed re-arm attempts; the trade manager flattens after 2.
    pub rearm_failures: u32,
    applied: HashSet<String>,
}

impl ChildOrder {
    pub fn new(role: ChildRole) -> Self {
        Self {
            role,
            state: ChildState::Created,
            rearm_failures: 0,
            applied: HashSet::new(),
        }
    }

    pub fn apply(&mut self, event: &ChildEvent, event_id: Option<&str>) -> Result<(), TransitionError> {
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

    fn do_transition(&mut self, event: &ChildEvent) -> Result<(), TransitionError> {
        use ChildEvent::*;
        use ChildState::*;

        match (self.state, event) {
            (Created, Submitted) => self.state = Working,
            (Working, Fill) => self.state = Filled,
            (Working, CancelAck) => self.state = Canceled,
            // Peer filled; this leg is canceled by the OCO invariant even if
            // it never reached Working.
            (Created, CancelAck) => self.state = Canceled,
            (Working | Created, ReArm) => {
                self.rearm_failures = 0;
            }
            (state, ev) => {
                return Err(TransitionError { from: state, event: format!("{ev:?}") });
            }
        }
        Ok(())
    }

    pub fn record_rearm_failure(&mut self) {
        self.rearm_failures += 1;
    }

    pub fn needs_flatten(&self) -> bool {
        self.rearm_failures >= 2
    }
}

/// Enforce the OCO invariant: when `filled` reaches `Filled`, its sibling
/// must be canceled. Returns the event the caller should apply to the sibling.
pub fn oco_cancel_event() -> ChildEvent {
    ChildEvent::CancelAck
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_child_fills() {
        let mut c = ChildOrder::new(ChildRole::Stop);
        c.apply(&ChildEvent::Submitted, Some("s1")).unwrap();
        c.apply(&ChildEvent::Fill, Some("f1")).unwrap();
        assert_eq!(c.state, ChildState::Filled);
        assert!(c.state.is_terminal());
    }

    #[test]
    fn two_rearm_failures_trigger_flatten() {
        let mut c = ChildOrder::new(ChildRole::Target);
        c.record_rearm_failure();
        assert!(!c.needs_flatten());
        c.record_rearm_failure();
        assert!(c.needs_flatten());
    }

    #[test]
    fn illegal_fill_before_working_is_rejected() {
        let mut c = ChildOrder::new(ChildRole::Stop);
        let err = c.apply(&ChildEvent::Fill, Some("f1")).unwrap_err();
        assert_eq!(err.from, ChildState::Created);
    }
}
