//! Pure escalation rule.
//!
//! A response escalates when its score is at or below the threshold on the
//! question's native scale AND the submitter wrote an issue description.
//! The free-text justification is mandatory; a bare low score never
//! escalates.

use uuid::Uuid;

use crate::domain::submissions::SurveyResponse;
use crate::domain::templates::TemplateTree;

/// Absolute threshold on the question's native scale, not the normalized
/// one. A 6 on a 1-10 question escalates; so does a 6 on a 0-100 question.
pub const ESCALATION_THRESHOLD: i32 = 6;

/// One task-to-be, before the repeat-issue probe runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub response_id: Uuid,
    pub question_id: Uuid,
    /// Question prompt, carried over as the task title.
    pub title: String,
    /// Issue description written by the submitter.
    pub description: String,
}

pub fn should_escalate(score: i32, issue_description: Option<&str>) -> bool {
    let justified = issue_description
        .map(|d| !d.trim().is_empty())
        .unwrap_or(false);
    score <= ESCALATION_THRESHOLD && justified
}

/// Collect the drafts for one submission's responses.
///
/// Responses whose question is missing from the tree are skipped; the
/// response validation boundary rejects those long before finalization.
pub fn escalation_drafts(tree: &TemplateTree, responses: &[SurveyResponse]) -> Vec<TaskDraft> {
    responses
        .iter()
        .filter(|r| should_escalate(r.score, r.issue_description.as_deref()))
        .filter_map(|r| {
            tree.find_question(r.question_id).map(|question| TaskDraft {
                response_id: r.id,
                question_id: r.question_id,
                title: question.prompt.clone(),
                description: r
                    .issue_description
                    .clone()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        assert!(should_escalate(6, Some("broken lamp")));
        assert!(should_escalate(1, Some("broken lamp")));
        assert!(!should_escalate(7, Some("broken lamp")));
    }

    #[test]
    fn low_score_without_justification_never_escalates() {
        assert!(!should_escalate(3, None));
        assert!(!should_escalate(3, Some("")));
        assert!(!should_escalate(3, Some("   ")));
    }
}
