//! Task escalation policy.
//!
//! Decides which internal-survey responses become remediation tasks and
//! creates them as a best-effort side effect of submission finalization.

pub mod policy;
pub mod rules;
pub mod store;

pub use policy::{EscalationPolicy, EscalationStore, NewTask};
pub use rules::{escalation_drafts, should_escalate, TaskDraft, ESCALATION_THRESHOLD};
pub use store::PgEscalationStore;
