//! Escalation policy service.
//!
//! Runs once per finalization: applies the pure rule, probes each draft for
//! a prior task on the same (property, question) pair, and inserts the
//! batch. The store is a trait so the policy runs against an in-memory
//! double in tests.

use axum::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::rules::{escalation_drafts, TaskDraft};
use crate::domain::submissions::{Submission, SurveyResponse};
use crate::domain::tasks::Task;
use crate::domain::templates::{SurveyKind, TemplateTree};

/// Task ready for insertion, repeat-issue flag resolved.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub submission_id: Uuid,
    pub response_id: Uuid,
    pub property_id: Uuid,
    pub question_id: Uuid,
    pub title: String,
    pub description: String,
    pub is_repeat_issue: bool,
}

impl NewTask {
    fn from_draft(draft: TaskDraft, submission: &Submission, is_repeat_issue: bool) -> Self {
        Self {
            submission_id: submission.id,
            response_id: draft.response_id,
            property_id: submission.property_id,
            question_id: draft.question_id,
            title: draft.title,
            description: draft.description,
            is_repeat_issue,
        }
    }
}

/// Persistence seam for the policy.
#[async_trait]
pub trait EscalationStore: Send + Sync {
    /// Whether any task already exists for this property/question pair,
    /// optionally limited to a lookback window in days.
    async fn prior_task_exists(
        &self,
        property_id: Uuid,
        question_id: Uuid,
        lookback_days: Option<u32>,
    ) -> anyhow::Result<bool>;

    /// Insert one batch of tasks and return the created rows.
    async fn insert_tasks(&self, tasks: Vec<NewTask>) -> anyhow::Result<Vec<Task>>;
}

pub struct EscalationPolicy<S> {
    store: Arc<S>,
    /// Repeat-issue lookback window; `None` considers the whole history.
    lookback_days: Option<u32>,
}

impl<S: EscalationStore> EscalationPolicy<S> {
    pub fn new(store: Arc<S>, lookback_days: Option<u32>) -> Self {
        Self {
            store,
            lookback_days,
        }
    }

    /// Evaluate one finalized submission and create its tasks.
    ///
    /// Only internal surveys escalate. The repeat-issue probe and the insert
    /// are separate statements; concurrent finalizations can race on the
    /// flag, which stays advisory metadata.
    pub async fn evaluate(
        &self,
        submission: &Submission,
        kind: SurveyKind,
        tree: &TemplateTree,
        responses: &[SurveyResponse],
    ) -> anyhow::Result<Vec<Task>> {
        if kind != SurveyKind::Internal {
            return Ok(Vec::new());
        }

        let drafts = escalation_drafts(tree, responses);
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let is_repeat = self
                .store
                .prior_task_exists(submission.property_id, draft.question_id, self.lookback_days)
                .await?;
            batch.push(NewTask::from_draft(draft, submission, is_repeat));
        }

        let created = self.store.insert_tasks(batch).await?;

        tracing::info!(
            submission_id = %submission.id,
            property_id = %submission.property_id,
            task_count = created.len(),
            "Escalated low-scoring responses into tasks"
        );

        Ok(created)
    }
}
