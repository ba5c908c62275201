//! Notification routes
//!
//! Endpoints for a user's in-app notification feed: list and mark read.

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
use crate::auth::RequireAuth;
use crate::domain::notifications::Notification;
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    notification_type: String,
    title: String,
    message: Option<String>,
    data: serde_json::Value,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            notification_type: row.notification_type,
            title: row.title,
            message: row.message,
            data: row.data,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct NotificationListParams {
    #[serde(flatten)]
    pub pagination: PaginationParams,
    #[serde(default)]
    pub unread_only: Option<bool>,
}

/// GET /notifications
///
/// List the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NotificationListParams>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let unread_only = params.unread_only.unwrap_or(false);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM notifications
        WHERE user_id = $1 AND ($2::bool = false OR read_at IS NULL)
        "#,
    )
    .bind(auth.user_id)
    .bind(unread_only)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT id, user_id, type, title, message, data, read_at, created_at
        FROM notifications
        WHERE user_id = $1 AND ($2::bool = false OR read_at IS NULL)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(auth.user_id)
    .bind(unread_only)
    .bind(params.pagination.limit() as i64)
    .bind(params.pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Notification> = rows.into_iter().map(Into::into).collect();

    Ok(Paginated::new(data, &params.pagination, total as u64))
}

/// POST /notifications/:notification_id/read
///
/// Mark one of the caller's notifications as read.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, NotificationRow>(
        r#"
        UPDATE notifications
        SET read_at = COALESCE(read_at, NOW())
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, type, title, message, data, read_at, created_at
        "#,
    )
    .bind(notification_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    Ok(Json(DataResponse::new(Notification::from(row))))
}
