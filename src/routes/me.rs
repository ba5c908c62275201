use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{RequireAuth, Role};
use crate::domain::users::UserProfile;
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    organization_id: Uuid,
    email: String,
    display_name: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

/// Get the current authenticated user's profile
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<Json<UserProfile>, ApiError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, organization_id, email, display_name, role, created_at FROM users WHERE id = $1",
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("User profile not found"))?;

    Ok(Json(UserProfile {
        id: row.id,
        organization_id: row.organization_id,
        email: row.email,
        display_name: row.display_name,
        // The row is authoritative; the token's role claim may lag behind
        // role changes (admin bootstrap in particular)
        role: Role::parse(&row.role).unwrap_or(auth.role),
        created_at: row.created_at,
    }))
}
