//! fbot-execution — C5 execution supervisor.
//!
//! Parent/child order state machines plus idempotent submission and
//! broker-truth reconciliation: an explicit legal-transition state machine
//! per order, behind a single submission choke-point that reconciles
//! against broker-reported state rather than trusting local assumptions.

mod child;
mod client_order_id;
mod parent;
mod supervisor;

pub use child::{ChildEvent, ChildOrder, ChildRole, ChildState};
pub use client_order_id::derive as derive_client_order_id;
pub use parent::{ParentEvent, ParentOrder, ParentState};
pub use supervisor::{ExecutionSupervisor, ReconcileOutcome, ENTRY_TTL_MS};
