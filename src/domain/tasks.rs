//! Remediation task domain types
//!
//! Tasks are created from low-scoring internal survey responses and move
//! through a small guarded status lifecycle. A closed task is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

/// Task status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Investigating,
    Closed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl TaskStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "investigating" => Some(Self::Investigating),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::Closed => "closed",
        }
    }
}

/// Rejected status transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("closing a task requires non-empty closing notes")]
    MissingClosingNotes,
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::InvalidTransition { .. } => {
                ApiError::validation("status", e.to_string())
            }
            TransitionError::MissingClosingNotes => {
                ApiError::validation("closing_notes", e.to_string())
            }
        }
    }
}

/// Validate one status transition against the lifecycle:
///
/// ```text
/// open -> investigating
/// open -> closed
/// investigating -> closed
/// ```
///
/// `closed` is terminal and `investigating` never regresses to `open`.
/// Closing requires non-blank notes.
pub fn validate_transition(
    current: TaskStatus,
    next: TaskStatus,
    closing_notes: Option<&str>,
) -> Result<(), TransitionError> {
    use TaskStatus::*;

    let allowed = matches!(
        (current, next),
        (Open, Investigating) | (Open, Closed) | (Investigating, Closed)
    );

    if !allowed {
        return Err(TransitionError::InvalidTransition {
            from: current.as_str(),
            to: next.as_str(),
        });
    }

    if next == Closed {
        let has_notes = closing_notes.map(|n| !n.trim().is_empty()).unwrap_or(false);
        if !has_notes {
            return Err(TransitionError::MissingClosingNotes);
        }
    }

    Ok(())
}

/// Task entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub response_id: Uuid,
    pub property_id: Uuid,
    pub question_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub is_repeat_issue: bool,
    pub assignee_id: Option<Uuid>,
    pub closing_notes: Option<String>,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for a status transition
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub closing_notes: Option<String>,
}

/// Request DTO for assigning a task
#[derive(Debug, Clone, Deserialize)]
pub struct AssignTaskRequest {
    pub assignee_id: Uuid,
}

/// Response DTO for task
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub property_id: Uuid,
    pub question_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub is_repeat_issue: bool,
    pub assignee_id: Option<Uuid>,
    pub closing_notes: Option<String>,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            submission_id: t.submission_id,
            property_id: t.property_id,
            question_id: t.question_id,
            title: t.title,
            description: t.description,
            status: t.status,
            is_repeat_issue: t.is_repeat_issue,
            assignee_id: t.assignee_id,
            closing_notes: t.closing_notes,
            closed_by: t.closed_by,
            closed_at: t.closed_at,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn open_moves_to_investigating_without_notes() {
        assert_eq!(validate_transition(Open, Investigating, None), Ok(()));
    }

    #[test]
    fn direct_close_from_open_requires_notes() {
        assert_eq!(
            validate_transition(Open, Closed, None),
            Err(TransitionError::MissingClosingNotes)
        );
        assert_eq!(
            validate_transition(Open, Closed, Some("   ")),
            Err(TransitionError::MissingClosingNotes)
        );
        assert_eq!(
            validate_transition(Open, Closed, Some("replaced the shower head")),
            Ok(())
        );
    }

    #[test]
    fn investigating_closes_with_notes() {
        assert_eq!(
            validate_transition(Investigating, Closed, Some("retrained team")),
            Ok(())
        );
    }

    #[test]
    fn closed_is_terminal() {
        for next in [Open, Investigating, Closed] {
            let err = validate_transition(Closed, next, Some("notes")).unwrap_err();
            assert_eq!(
                err,
                TransitionError::InvalidTransition {
                    from: "closed",
                    to: next.as_str(),
                }
            );
        }
    }

    #[test]
    fn investigating_never_regresses_to_open() {
        assert_eq!(
            validate_transition(Investigating, Open, None),
            Err(TransitionError::InvalidTransition {
                from: "investigating",
                to: "open",
            })
        );
    }

    #[test]
    fn self_transitions_are_rejected() {
        assert!(validate_transition(Open, Open, None).is_err());
        assert!(validate_transition(Investigating, Investigating, None).is_err());
    }

    #[test]
    fn invalid_transition_error_names_the_pair() {
        let err = validate_transition(Investigating, Open, None).unwrap_err();
        assert_eq!(err.to_string(), "invalid transition investigating -> open");
    }
}
