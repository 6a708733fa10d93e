//! fbot-gate — C8 permission gate.
//!
//! The single choke-point a bar must pass through before the execution
//! supervisor is allowed to submit anything: an ordered list of named
//! blockers, fail-closed on the first one that trips. Soft conditions
//! never block; they're recorded as warnings on the readiness snapshot so
//! an operator can see them without the bot refusing to trade.
//!
//! Pure and deterministic: no IO, no clock. Every field of [`PermissionInput`]
//! is supplied by the caller, already computed.

use std::fmt;

/// Everything the gate needs to know about the current bar to decide
/// whether a new entry may be submitted.
#[derive(Clone, Debug, PartialEq)]
pub struct PermissionInput {
    pub kill_switch_active: bool,
    pub broker_session_ready: bool,
    pub broker_account_ready: bool,
    pub execution_armed: bool,
    /// True when data quality (DVS) has collapsed past the kill threshold.
    /// This is a hard blocker, distinct from the soft EQS warning below.
    pub data_quality_critical: bool,
    /// True when EQS is below its threshold but DVS has not collapsed.
    /// Recorded as a warning; does not block.
    pub data_quality_soft_warn: bool,
    pub days_to_expiry: u32,
    pub min_days_to_expiry: u32,
}

/// The first blocking condition encountered, in evaluation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Blocker {
    KillSwitchActive,
    BrokerSessionNotReady,
    BrokerAccountNotReady,
    ExecutionNotArmed,
    DataQualityCritical,
    DaysToExpiryFloor,
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Blocker::KillSwitchActive => "GATE_BLOCKED: kill switch active",
            Blocker::BrokerSessionNotReady => "GATE_BLOCKED: broker session not ready",
            Blocker::BrokerAccountNotReady => "GATE_BLOCKED: broker account not ready",
            Blocker::ExecutionNotArmed => "GATE_BLOCKED: execution not armed",
            Blocker::DataQualityCritical => "GATE_BLOCKED: data quality critical",
            Blocker::DaysToExpiryFloor => "GATE_BLOCKED: below minimum days to expiry",
        };
        write!(f, "{s}")
    }
}

/// A non-blocking condition worth surfacing on the readiness snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    DataQualitySoft,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DataQualitySoft => write!(f, "WARN: data quality below soft threshold"),
        }
    }
}

/// Verdict of one gate evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionVerdict {
    pub blocked_by: Option<Blocker>,
    pub warnings: Vec<Warning>,
}

impl PermissionVerdict {
    pub fn is_permitted(&self) -> bool {
        self.blocked_by.is_none()
    }
}

/// Evaluate the ordered blocker list, fail-closed on the first hit.
/// Warnings are independent of blocking and always collected.
pub fn evaluate(input: &PermissionInput) -> PermissionVerdict {
    let mut warnings = Vec::new();
    if input.data_quality_soft_warn {
        warnings.push(Warning::DataQualitySoft);
    }

    let blocked_by = if input.kill_switch_active {
        Some(Blocker::KillSwitchActive)
    } else if !input.broker_session_ready {
        Some(Blocker::BrokerSessionNotReady)
    } else if !input.broker_account_ready {
        Some(Blocker::BrokerAccountNotReady)
    } else if !input.execution_armed {
        Some(Blocker::ExecutionNotArmed)
    } else if input.data_quality_critical {
        Some(Blocker::DataQualityCritical)
    } else if input.days_to_expiry < input.min_days_to_expiry {
        Some(Blocker::DaysToExpiryFloor)
    } else {
        None
    };

    PermissionVerdict {
        blocked_by,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_input() -> PermissionInput {
        PermissionInput {
            kill_switch_active: false,
            broker_session_ready: true,
            broker_account_ready: true,
            execution_armed: true,
            data_quality_critical: false,
            data_quality_soft_warn: false,
            days_to_expiry: 20,
            min_days_to_expiry: 5,
        }
    }

    #[test]
    fn all_clear_permits() {
        let v = evaluate(&clean_input());
        assert!(v.is_permitted());
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn kill_switch_blocks_first() {
        let mut inp = clean_input();
        inp.kill_switch_active = true;
        inp.broker_session_ready = false;
        let v = evaluate(&inp);
        assert_eq!(v.blocked_by, Some(Blocker::KillSwitchActive));
    }

    #[test]
    fn execution_not_armed_blocks() {
        let mut inp = clean_input();
        inp.execution_armed = false;
        let v = evaluate(&inp);
        assert_eq!(v.blocked_by, Some(Blocker::ExecutionNotArmed));
    }

    #[test]
    fn days_to_expiry_floor_blocks() {
        let mut inp = clean_input();
        inp.days_to_expiry = 3;
        let v = evaluate(&inp);
        assert_eq!(v.blocked_by, Some(Blocker::DaysToExpiryFloor));
    }

    #[test]
    fn soft_data_quality_warns_but_permits() {
        let mut inp = clean_input();
        inp.data_quality_soft_warn = true;
        let v = evaluate(&inp);
        assert!(v.is_permitted());
        assert_eq!(v.warnings, vec![Warning::DataQualitySoft]);
    }

    #[test]
    fn critical_data_quality_blocks_even_with_soft_warning() {
        let mut inp = clean_input();
        inp.data_quality_soft_warn = true;
        inp.data_quality_critical = true;
        let v = evaluate(&inp);
        assert_eq!(v.blocked_by, Some(Blocker::DataQualityCritical));
        assert_eq!(v.warnings, vec![Warning::DataQualitySoft]);
    }
}
