//! Postgres-backed escalation store.

use anyhow::Context;
use axum::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::policy::{EscalationStore, NewTask};
use crate::domain::tasks::{Task, TaskStatus};

#[derive(Clone)]
pub struct PgEscalationStore {
    pool: PgPool,
}

impl PgEscalationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    submission_id: Uuid,
    response_id: Uuid,
    property_id: Uuid,
    question_id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    is_repeat_issue: bool,
    assignee_id: Option<Uuid>,
    closing_notes: Option<String>,
    closed_by: Option<Uuid>,
    closed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            submission_id: row.submission_id,
            response_id: row.response_id,
            property_id: row.property_id,
            question_id: row.question_id,
            title: row.title,
            description: row.description,
            status: TaskStatus::parse(&row.status).unwrap_or_default(),
            is_repeat_issue: row.is_repeat_issue,
            assignee_id: row.assignee_id,
            closing_notes: row.closing_notes,
            closed_by: row.closed_by,
            closed_at: row.closed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl EscalationStore for PgEscalationStore {
    async fn prior_task_exists(
        &self,
        property_id: Uuid,
        question_id: Uuid,
        lookback_days: Option<u32>,
    ) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM tasks
                WHERE property_id = $1
                  AND question_id = $2
                  AND ($3::INT IS NULL OR created_at >= NOW() - make_interval(days => $3))
            )
            "#,
        )
        .bind(property_id)
        .bind(question_id)
        .bind(lookback_days.map(|d| d as i32))
        .fetch_one(&self.pool)
        .await
        .context("Repeat-issue probe failed")?;

        Ok(exists)
    }

    async fn insert_tasks(&self, tasks: Vec<NewTask>) -> anyhow::Result<Vec<Task>> {
        let mut created = Vec::with_capacity(tasks.len());
        let mut tx = self.pool.begin().await.context("Task batch begin failed")?;

        for task in tasks {
            let row = sqlx::query_as::<_, TaskRow>(
                r#"
                INSERT INTO tasks (id, submission_id, response_id, property_id, question_id,
                                   title, description, status, is_repeat_issue,
                                   created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'open', $8, NOW(), NOW())
                RETURNING id, submission_id, response_id, property_id, question_id,
                          title, description, status, is_repeat_issue, assignee_id,
                          closing_notes, closed_by, closed_at, created_at, updated_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(task.submission_id)
            .bind(task.response_id)
            .bind(task.property_id)
            .bind(task.question_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.is_repeat_issue)
            .fetch_one(&mut *tx)
            .await
            .context("Task insert failed")?;

            created.push(Task::from(row));
        }

        tx.commit().await.context("Task batch commit failed")?;
        Ok(created)
    }
}
