//! SOP checklist routes
//!
//! Recurring compliance items per property. Due/overdue is computed on read
//! via the pure functions in `domain::sop`; nothing runs on a timer, and
//! completing an item just appends to the completion log.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::{authorize, Access, RequireAuth};
use crate::domain::sop::{
    item_due_status, ChecklistResponse, ChecklistStatusResponse, CompleteItemRequest,
    CreateChecklistRequest, ItemStatusResponse, SopChecklist, SopFrequency, SopItem,
};
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct ChecklistRow {
    id: Uuid,
    property_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<ChecklistRow> for SopChecklist {
    fn from(row: ChecklistRow) -> Self {
        Self {
            id: row.id,
            property_id: row.property_id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    checklist_id: Uuid,
    name: String,
    frequency: String,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for SopItem {
    type Error = ApiError;

    fn try_from(row: ItemRow) -> Result<Self, ApiError> {
        let frequency = SopFrequency::parse(&row.frequency).ok_or_else(|| {
            ApiError::internal(format!("Unknown SOP frequency {}", row.frequency))
        })?;

        Ok(Self {
            id: row.id,
            checklist_id: row.checklist_id,
            name: row.name,
            frequency,
            sort_order: row.sort_order,
            created_at: row.created_at,
        })
    }
}

async fn load_checklist(db: &PgPool, checklist_id: Uuid) -> Result<SopChecklist, ApiError> {
    let row = sqlx::query_as::<_, ChecklistRow>(
        "SELECT id, property_id, name, created_at FROM sop_checklists WHERE id = $1",
    )
    .bind(checklist_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Checklist not found"))?;

    Ok(row.into())
}

async fn load_items(db: &PgPool, checklist_id: Uuid) -> Result<Vec<SopItem>, ApiError> {
    sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT id, checklist_id, name, frequency, sort_order, created_at
        FROM sop_items WHERE checklist_id = $1
        ORDER BY sort_order
        "#,
    )
    .bind(checklist_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(SopItem::try_from)
    .collect()
}

/// GET /properties/:property_id/sop-checklists
pub async fn list_checklists(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::SubmitForProperty(property_id)).await?;

    let checklist_rows = sqlx::query_as::<_, ChecklistRow>(
        r#"
        SELECT id, property_id, name, created_at
        FROM sop_checklists WHERE property_id = $1
        ORDER BY name
        "#,
    )
    .bind(property_id)
    .fetch_all(&state.db)
    .await?;

    let mut data = Vec::with_capacity(checklist_rows.len());
    for row in checklist_rows {
        let checklist = SopChecklist::from(row);
        let items = load_items(&state.db, checklist.id).await?;
        data.push(ChecklistResponse { checklist, items });
    }

    Ok(Json(DataResponse::new(data)))
}

/// POST /properties/:property_id/sop-checklists
///
/// Create a checklist with its items. Managers and admins only.
pub async fn create_checklist(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<CreateChecklistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::ManageProperty(property_id)).await?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }
    for item in &req.items {
        if item.name.trim().is_empty() {
            return Err(ApiError::validation("items", "item names must not be empty"));
        }
    }

    let mut tx = state.db.begin().await?;

    let checklist_row = sqlx::query_as::<_, ChecklistRow>(
        r#"
        INSERT INTO sop_checklists (id, property_id, name, created_at)
        VALUES ($1, $2, $3, NOW())
        RETURNING id, property_id, name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(property_id)
    .bind(req.name.trim())
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO sop_items (id, checklist_id, name, frequency, sort_order, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, checklist_id, name, frequency, sort_order, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(checklist_row.id)
        .bind(item.name.trim())
        .bind(item.frequency.as_str())
        .bind(item.sort_order)
        .fetch_one(&mut *tx)
        .await?;

        items.push(SopItem::try_from(row)?);
    }

    tx.commit().await?;

    Ok(Created(DataResponse::new(ChecklistResponse {
        checklist: checklist_row.into(),
        items,
    })))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatusParams {
    /// Date to evaluate against; today when omitted.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// GET /sop-checklists/:checklist_id/status?date=
///
/// Due/overdue status of every item on the given date.
pub async fn checklist_status(
    State(state): State<Arc<AppState>>,
    Path(checklist_id): Path<Uuid>,
    Query(params): Query<StatusParams>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let checklist = load_checklist(&state.db, checklist_id).await?;
    authorize(
        &state.db,
        &auth,
        Access::SubmitForProperty(checklist.property_id),
    )
    .await?;

    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let items = load_items(&state.db, checklist_id).await?;

    #[derive(Debug, sqlx::FromRow)]
    struct LastCompletionRow {
        item_id: Uuid,
        completed_on: NaiveDate,
    }

    // Last completion on or before the asked-about date, per item
    let completions = sqlx::query_as::<_, LastCompletionRow>(
        r#"
        SELECT item_id, MAX(completed_on) AS completed_on
        FROM sop_completions
        WHERE item_id = ANY($1) AND completed_on <= $2
        GROUP BY item_id
        "#,
    )
    .bind(&items.iter().map(|i| i.id).collect::<Vec<_>>())
    .bind(date)
    .fetch_all(&state.db)
    .await?;

    let statuses = items
        .into_iter()
        .map(|item| {
            let last_completed = completions
                .iter()
                .find(|c| c.item_id == item.id)
                .map(|c| c.completed_on);

            let status = item_due_status(
                item.frequency,
                item.created_at.date_naive(),
                last_completed,
                date,
            );

            ItemStatusResponse {
                item,
                last_completed,
                due_on: status.due_on,
                state: status.state,
            }
        })
        .collect();

    Ok(Json(DataResponse::new(ChecklistStatusResponse {
        checklist_id,
        name: checklist.name,
        date,
        items: statuses,
    })))
}

/// POST /sop-items/:item_id/complete
///
/// Record a completion for one item.
pub async fn complete_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<CompleteItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let property_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT sc.property_id
        FROM sop_items si
        JOIN sop_checklists sc ON sc.id = si.checklist_id
        WHERE si.id = $1
        "#,
    )
    .bind(item_id)
    .fetch_optional(&state.db)
    .await?;
    let property_id = property_id.ok_or_else(|| ApiError::not_found("Checklist item not found"))?;

    authorize(&state.db, &auth, Access::SubmitForProperty(property_id)).await?;

    let completed_on = req
        .completed_on
        .unwrap_or_else(|| Utc::now().date_naive());

    sqlx::query(
        r#"
        INSERT INTO sop_completions (id, item_id, completed_by, completed_on, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(item_id)
    .bind(auth.user_id)
    .bind(completed_on)
    .execute(&state.db)
    .await?;

    tracing::info!(item_id = %item_id, completed_on = %completed_on, "SOP item completed");

    Ok(Created(MessageResponse::new("Completion recorded")))
}
