//! Property routes
//!
//! Admins create and edit properties; managers and staff see the ones they
//! are assigned to.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::{authorize, Access, RequireAuth};
use crate::domain::properties::{
    CreatePropertyRequest, Property, PropertyResponse, UpdatePropertyRequest,
};
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            address: row.address,
            city: row.city,
            country: row.country,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Organization of the calling user; properties are scoped to it.
pub(crate) async fn caller_organization(
    db: &sqlx::PgPool,
    user_id: Uuid,
) -> Result<Uuid, ApiError> {
    sqlx::query_scalar("SELECT organization_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("User profile not found"))
}

/// Fetch one property or 404.
pub(crate) async fn load_property(
    db: &sqlx::PgPool,
    property_id: Uuid,
) -> Result<Property, ApiError> {
    let row = sqlx::query_as::<_, PropertyRow>(
        r#"
        SELECT id, organization_id, name, address, city, country, created_at, updated_at
        FROM properties WHERE id = $1
        "#,
    )
    .bind(property_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Property not found"))?;

    Ok(row.into())
}

/// POST /properties
///
/// Create a property. Admin only.
pub async fn create_property(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<CreatePropertyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }

    let organization_id = caller_organization(&state.db, auth.user_id).await?;

    let row = sqlx::query_as::<_, PropertyRow>(
        r#"
        INSERT INTO properties (id, organization_id, name, address, city, country,
                                created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
        RETURNING id, organization_id, name, address, city, country, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(req.name.trim())
    .bind(&req.address)
    .bind(&req.city)
    .bind(&req.country)
    .fetch_one(&state.db)
    .await?;

    Ok(Created(DataResponse::new(PropertyResponse::from(
        Property::from(row),
    ))))
}

/// GET /properties
///
/// List properties visible to the caller: the whole organization for admins,
/// assigned properties for managers and staff.
pub async fn list_properties(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let caller = authorize(&state.db, &auth, Access::Authenticated).await?;
    let organization_id = caller_organization(&state.db, auth.user_id).await?;
    let visible = caller.visible_properties().map(|ids| ids.to_vec());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM properties
        WHERE organization_id = $1
          AND ($2::uuid[] IS NULL OR id = ANY($2))
        "#,
    )
    .bind(organization_id)
    .bind(&visible)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, PropertyRow>(
        r#"
        SELECT id, organization_id, name, address, city, country, created_at, updated_at
        FROM properties
        WHERE organization_id = $1
          AND ($2::uuid[] IS NULL OR id = ANY($2))
        ORDER BY name
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(organization_id)
    .bind(&visible)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<PropertyResponse> = rows
        .into_iter()
        .map(|r| PropertyResponse::from(Property::from(r)))
        .collect();

    Ok(Paginated::new(data, &pagination, total as u64))
}

/// GET /properties/:property_id
pub async fn get_property(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::SubmitForProperty(property_id)).await?;

    let property = load_property(&state.db, property_id).await?;
    Ok(Json(DataResponse::new(PropertyResponse::from(property))))
}

/// PUT /properties/:property_id
///
/// Update a property. Admin only.
pub async fn update_property(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<UpdatePropertyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::validation("name", "must not be empty"));
        }
    }

    let row = sqlx::query_as::<_, PropertyRow>(
        r#"
        UPDATE properties SET
            name = COALESCE($2, name),
            address = COALESCE($3, address),
            city = COALESCE($4, city),
            country = COALESCE($5, country),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, organization_id, name, address, city, country, created_at, updated_at
        "#,
    )
    .bind(property_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(&req.address)
    .bind(&req.city)
    .bind(&req.country)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Property not found"))?;

    Ok(Json(DataResponse::new(PropertyResponse::from(
        Property::from(row),
    ))))
}
