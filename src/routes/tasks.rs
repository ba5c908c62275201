//! Remediation task routes
//!
//! Listing, detail, assignment, and the guarded status transition. Transition
//! requests are validated against the status as persisted at the moment of
//! the write, and the caller's role/property scope is re-checked here even
//! though the guard already ran at the boundary.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::{authorize, Access, RequireAuth};
use crate::domain::tasks::{
    validate_transition, AssignTaskRequest, Task, TaskResponse, TaskStatus, TransitionRequest,
};
use crate::error::ApiError;
use crate::services::notifications;

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

impl TryFrom<TaskRow> for Task {
    type Error = ApiError;

    fn try_from(row: TaskRow) -> Result<Self, ApiError> {
        let status = TaskStatus::parse(&row.status)
            .ok_or_else(|| ApiError::internal(format!("Unknown task status {}", row.status)))?;

        Ok(Self {
            id: row.id,
            submission_id: row.submission_id,
            response_id: row.response_id,
            property_id: row.property_id,
            question_id: row.question_id,
            title: row.title,
            description: row.description,
            status,
            is_repeat_issue: row.is_repeat_issue,
            assignee_id: row.assignee_id,
            closing_notes: row.closing_notes,
            closed_by: row.closed_by,
            closed_at: row.closed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TASK_COLUMNS: &str = "id, submission_id, response_id, property_id, question_id, \
     title, description, status, is_repeat_issue, assignee_id, \
     closing_notes, closed_by, closed_at, created_at, updated_at";

async fn load_task(db: &sqlx::PgPool, task_id: Uuid) -> Result<Task, ApiError> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {} FROM tasks WHERE id = $1",
        TASK_COLUMNS
    ))
    .bind(task_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Task not found"))?;

    row.try_into()
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskListParams {
    #[serde(flatten)]
    pub pagination: PaginationParams,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// GET /properties/:property_id/tasks
///
/// List tasks for a property, optionally filtered by status. Managers and
/// admins only.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    Query(params): Query<TaskListParams>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::ManageProperty(property_id)).await?;

    let status = params.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM tasks
        WHERE property_id = $1 AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(property_id)
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        SELECT {}
        FROM tasks
        WHERE property_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        TASK_COLUMNS
    ))
    .bind(property_id)
    .bind(status)
    .bind(params.pagination.limit() as i64)
    .bind(params.pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let data = rows
        .into_iter()
        .map(|r| Task::try_from(r).map(TaskResponse::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated::new(data, &params.pagination, total as u64))
}

/// GET /tasks/:task_id
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, task_id).await?;
    authorize(&state.db, &auth, Access::ManageProperty(task.property_id)).await?;

    Ok(Json(DataResponse::new(TaskResponse::from(task))))
}

/// PATCH /tasks/:task_id/status
///
/// Perform one status transition. The allowed set is
/// open -> investigating, open -> closed, investigating -> closed; closing
/// requires non-blank notes. The UPDATE is guarded on the status the
/// transition was validated against, so a concurrent competing transition
/// surfaces as a conflict instead of silently overwriting.
pub async fn transition_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, task_id).await?;
    let caller = authorize(&state.db, &auth, Access::ManageProperty(task.property_id)).await?;

    // The state machine validates independently of the guard above
    caller.check(Access::ManageProperty(task.property_id))?;
    validate_transition(task.status, req.status, req.closing_notes.as_deref())?;

    let closing = req.status == TaskStatus::Closed;
    let closing_notes = req
        .closing_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let row = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        UPDATE tasks SET
            status = $3,
            closing_notes = CASE WHEN $4 THEN $5 ELSE closing_notes END,
            closed_by = CASE WHEN $4 THEN $6 ELSE closed_by END,
            closed_at = CASE WHEN $4 THEN NOW() ELSE closed_at END,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {}
        "#,
        TASK_COLUMNS
    ))
    .bind(task_id)
    .bind(task.status.as_str())
    .bind(req.status.as_str())
    .bind(closing)
    .bind(closing_notes)
    .bind(caller.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::conflict("Task status changed concurrently; retry"))?;

    let updated = Task::try_from(row)?;

    tracing::info!(
        task_id = %task_id,
        from = task.status.as_str(),
        to = updated.status.as_str(),
        "Task transitioned"
    );

    Ok(Json(DataResponse::new(TaskResponse::from(updated))))
}

/// PATCH /tasks/:task_id/assign
///
/// Assign a task to a user. Writes a notification row and sends a
/// best-effort email.
pub async fn assign_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<AssignTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, task_id).await?;
    authorize(&state.db, &auth, Access::ManageProperty(task.property_id)).await?;

    if task.status == TaskStatus::Closed {
        return Err(ApiError::conflict("Closed tasks cannot be reassigned"));
    }

    let assignee_email: Option<String> =
        sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(req.assignee_id)
            .fetch_optional(&state.db)
            .await?;
    let assignee_email =
        assignee_email.ok_or_else(|| ApiError::not_found("Assignee not found"))?;

    let row = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        UPDATE tasks SET assignee_id = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        TASK_COLUMNS
    ))
    .bind(task_id)
    .bind(req.assignee_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Task not found"))?;

    let updated = Task::try_from(row)?;

    let property_name: String = sqlx::query_scalar("SELECT name FROM properties WHERE id = $1")
        .bind(updated.property_id)
        .fetch_optional(&state.db)
        .await?
        .unwrap_or_default();

    if let Err(e) =
        notifications::notify_task_assigned(&state.db, req.assignee_id, &updated, &property_name)
            .await
    {
        tracing::warn!(task_id = %task_id, error = %e, "Failed to create assignment notification");
    }

    if let Some(mailer) = &state.mailer {
        let mailer = mailer.clone();
        let title = updated.title.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_task_assignment(&assignee_email, &title, &property_name)
                .await
            {
                tracing::warn!(task_id = %task_id, error = %e, "Assignment email failed");
            }
        });
    }

    Ok(Json(DataResponse::new(TaskResponse::from(updated))))
}
