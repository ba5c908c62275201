//! Survey template routes
//!
//! Admin-only CRUD over the template tree: template -> categories ->
//! subcategories -> questions. The full ordered tree is served to any
//! authenticated caller so survey-taking clients can render forms.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::{authorize, Access, RequireAuth};
use crate::domain::templates::{
    Category, CategoryNode, CreateCategoryRequest, CreateQuestionRequest,
    CreateSubcategoryRequest, CreateTemplateRequest, Question, Subcategory, SubcategoryNode,
    SurveyKind, Template, TemplateTree, UpdateCategoryRequest, UpdateQuestionRequest,
    UpdateTemplateRequest,
};
use crate::error::ApiError;
use crate::routes::properties::caller_organization;

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    version: i32,
    survey_kind: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = ApiError;

    fn try_from(row: TemplateRow) -> Result<Self, ApiError> {
        let survey_kind = SurveyKind::parse(&row.survey_kind)
            .ok_or_else(|| ApiError::internal(format!("Unknown survey kind {}", row.survey_kind)))?;

        Ok(Self {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            version: row.version,
            survey_kind,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    template_id: Uuid,
    name: String,
    weight: Decimal,
    sort_order: i32,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            template_id: row.template_id,
            name: row.name,
            weight: row.weight,
            sort_order: row.sort_order,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubcategoryRow {
    id: Uuid,
    category_id: Uuid,
    name: String,
    sort_order: i32,
}

impl From<SubcategoryRow> for Subcategory {
    fn from(row: SubcategoryRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            sort_order: row.sort_order,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuestionRow {
    id: Uuid,
    subcategory_id: Uuid,
    prompt: String,
    description: Option<String>,
    scale_min: i32,
    scale_max: i32,
    is_required: bool,
    sort_order: i32,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            subcategory_id: row.subcategory_id,
            prompt: row.prompt,
            description: row.description,
            scale_min: row.scale_min,
            scale_max: row.scale_max,
            is_required: row.is_required,
            sort_order: row.sort_order,
        }
    }
}

/// Load one template with its full ordered tree.
///
/// Ordering follows each level's `sort_order`; the tree is the consistent
/// snapshot the scoring engine and escalation policy work from.
pub(crate) async fn load_template_tree(
    db: &PgPool,
    template_id: Uuid,
) -> Result<TemplateTree, ApiError> {
    let template_row = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, organization_id, name, version, survey_kind, is_active,
               created_at, updated_at
        FROM templates WHERE id = $1
        "#,
    )
    .bind(template_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Template not found"))?;

    let template = Template::try_from(template_row)?;

    let categories: Vec<Category> = sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT id, template_id, name, weight, sort_order
        FROM categories WHERE template_id = $1
        ORDER BY sort_order
        "#,
    )
    .bind(template_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();

    let category_ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();

    let subcategories: Vec<Subcategory> = sqlx::query_as::<_, SubcategoryRow>(
        r#"
        SELECT id, category_id, name, sort_order
        FROM subcategories WHERE category_id = ANY($1)
        ORDER BY sort_order
        "#,
    )
    .bind(&category_ids)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();

    let subcategory_ids: Vec<Uuid> = subcategories.iter().map(|s| s.id).collect();

    let questions: Vec<Question> = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, subcategory_id, prompt, description, scale_min, scale_max,
               is_required, sort_order
        FROM questions WHERE subcategory_id = ANY($1)
        ORDER BY sort_order
        "#,
    )
    .bind(&subcategory_ids)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();

    let nodes = categories
        .into_iter()
        .map(|category| {
            let subcategories = subcategories
                .iter()
                .filter(|s| s.category_id == category.id)
                .map(|subcategory| SubcategoryNode {
                    subcategory: subcategory.clone(),
                    questions: questions
                        .iter()
                        .filter(|q| q.subcategory_id == subcategory.id)
                        .cloned()
                        .collect(),
                })
                .collect();

            CategoryNode {
                category,
                subcategories,
            }
        })
        .collect();

    Ok(TemplateTree {
        template,
        categories: nodes,
    })
}

fn validate_weight(weight: Decimal) -> Result<(), ApiError> {
    if weight <= Decimal::ZERO {
        return Err(ApiError::validation("weight", "must be greater than zero"));
    }
    Ok(())
}

fn validate_scale(scale_min: i32, scale_max: i32) -> Result<(), ApiError> {
    if scale_min >= scale_max {
        return Err(ApiError::validation(
            "scale_min",
            format!("must be less than scale_max ({} >= {})", scale_min, scale_max),
        ));
    }
    Ok(())
}

// ============================================================================
// Template Endpoints
// ============================================================================

/// POST /templates
///
/// Create a template. Admin only.
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }

    let organization_id = caller_organization(&state.db, auth.user_id).await?;

    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO templates (id, organization_id, name, version, survey_kind, is_active,
                               created_at, updated_at)
        VALUES ($1, $2, $3, 1, $4, TRUE, NOW(), NOW())
        RETURNING id, organization_id, name, version, survey_kind, is_active,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(req.name.trim())
    .bind(req.survey_kind.as_str())
    .fetch_one(&state.db)
    .await?;

    Ok(Created(DataResponse::new(Template::try_from(row)?)))
}

/// GET /templates
///
/// List templates for the caller's organization.
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Authenticated).await?;
    let organization_id = caller_organization(&state.db, auth.user_id).await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM templates WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&state.db)
            .await?;

    let rows = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, organization_id, name, version, survey_kind, is_active,
               created_at, updated_at
        FROM templates
        WHERE organization_id = $1
        ORDER BY name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(organization_id)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let data = rows
        .into_iter()
        .map(Template::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated::new(data, &pagination, total as u64))
}

/// GET /templates/:template_id
///
/// Full ordered template tree.
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Authenticated).await?;

    let tree = load_template_tree(&state.db, template_id).await?;
    Ok(Json(DataResponse::new(tree)))
}

/// PUT /templates/:template_id
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::validation("name", "must not be empty"));
        }
    }

    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        UPDATE templates SET
            name = COALESCE($2, name),
            is_active = COALESCE($3, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, organization_id, name, version, survey_kind, is_active,
                  created_at, updated_at
        "#,
    )
    .bind(template_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Template not found"))?;

    Ok(Json(DataResponse::new(Template::try_from(row)?)))
}

/// DELETE /templates/:template_id
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    // Templates with recorded submissions are deactivated, not destroyed
    let submission_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE template_id = $1")
            .bind(template_id)
            .fetch_one(&state.db)
            .await?;

    if submission_count > 0 {
        return Err(ApiError::conflict(
            "Template has submissions; deactivate it instead",
        ));
    }

    let result = sqlx::query("DELETE FROM templates WHERE id = $1")
        .bind(template_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Template not found"));
    }

    Ok(Json(MessageResponse::new("Template deleted")))
}

// ============================================================================
// Category Endpoints
// ============================================================================

/// POST /templates/:template_id/categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }

    let weight = req.weight.unwrap_or(Decimal::ONE);
    validate_weight(weight)?;

    let template_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM templates WHERE id = $1)")
            .bind(template_id)
            .fetch_one(&state.db)
            .await?;
    if !template_exists {
        return Err(ApiError::not_found("Template not found"));
    }

    let row = sqlx::query_as::<_, CategoryRow>(
        r#"
        INSERT INTO categories (id, template_id, name, weight, sort_order)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, template_id, name, weight, sort_order
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(template_id)
    .bind(req.name.trim())
    .bind(weight)
    .bind(req.sort_order)
    .fetch_one(&state.db)
    .await?;

    Ok(Created(DataResponse::new(Category::from(row))))
}

/// PUT /categories/:category_id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::validation("name", "must not be empty"));
        }
    }
    if let Some(weight) = req.weight {
        validate_weight(weight)?;
    }

    let row = sqlx::query_as::<_, CategoryRow>(
        r#"
        UPDATE categories SET
            name = COALESCE($2, name),
            weight = COALESCE($3, weight),
            sort_order = COALESCE($4, sort_order)
        WHERE id = $1
        RETURNING id, template_id, name, weight, sort_order
        "#,
    )
    .bind(category_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.weight)
    .bind(req.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(DataResponse::new(Category::from(row))))
}

/// DELETE /categories/:category_id
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Category not found"));
    }

    Ok(Json(MessageResponse::new("Category deleted")))
}

// ============================================================================
// Subcategory Endpoints
// ============================================================================

/// POST /categories/:category_id/subcategories
pub async fn create_subcategory(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<CreateSubcategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    let category_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
            .bind(category_id)
            .fetch_one(&state.db)
            .await?;
    if !category_exists {
        return Err(ApiError::not_found("Category not found"));
    }

    // An empty name is allowed and means "no subcategory"
    let row = sqlx::query_as::<_, SubcategoryRow>(
        r#"
        INSERT INTO subcategories (id, category_id, name, sort_order)
        VALUES ($1, $2, $3, $4)
        RETURNING id, category_id, name, sort_order
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(category_id)
    .bind(req.name.trim())
    .bind(req.sort_order)
    .fetch_one(&state.db)
    .await?;

    Ok(Created(DataResponse::new(Subcategory::from(row))))
}

/// DELETE /subcategories/:subcategory_id
pub async fn delete_subcategory(
    State(state): State<Arc<AppState>>,
    Path(subcategory_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    let result = sqlx::query("DELETE FROM subcategories WHERE id = $1")
        .bind(subcategory_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Subcategory not found"));
    }

    Ok(Json(MessageResponse::new("Subcategory deleted")))
}

// ============================================================================
// Question Endpoints
// ============================================================================

/// POST /subcategories/:subcategory_id/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Path(subcategory_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if req.prompt.trim().is_empty() {
        return Err(ApiError::validation("prompt", "must not be empty"));
    }
    validate_scale(req.scale_min, req.scale_max)?;

    let subcategory_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM subcategories WHERE id = $1)")
            .bind(subcategory_id)
            .fetch_one(&state.db)
            .await?;
    if !subcategory_exists {
        return Err(ApiError::not_found("Subcategory not found"));
    }

    let row = sqlx::query_as::<_, QuestionRow>(
        r#"
        INSERT INTO questions (id, subcategory_id, prompt, description, scale_min, scale_max,
                               is_required, sort_order)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, subcategory_id, prompt, description, scale_min, scale_max,
                  is_required, sort_order
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subcategory_id)
    .bind(req.prompt.trim())
    .bind(&req.description)
    .bind(req.scale_min)
    .bind(req.scale_max)
    .bind(req.is_required)
    .bind(req.sort_order)
    .fetch_one(&state.db)
    .await?;

    Ok(Created(DataResponse::new(Question::from(row))))
}

/// PUT /questions/:question_id
///
/// Prompt, description, required flag, and ordering are editable; the scale
/// is fixed once created because recorded responses were scored against it.
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    if let Some(prompt) = &req.prompt {
        if prompt.trim().is_empty() {
            return Err(ApiError::validation("prompt", "must not be empty"));
        }
    }

    let row = sqlx::query_as::<_, QuestionRow>(
        r#"
        UPDATE questions SET
            prompt = COALESCE($2, prompt),
            description = COALESCE($3, description),
            is_required = COALESCE($4, is_required),
            sort_order = COALESCE($5, sort_order)
        WHERE id = $1
        RETURNING id, subcategory_id, prompt, description, scale_min, scale_max,
                  is_required, sort_order
        "#,
    )
    .bind(question_id)
    .bind(req.prompt.as_deref().map(str::trim))
    .bind(&req.description)
    .bind(req.is_required)
    .bind(req.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Question not found"))?;

    Ok(Json(DataResponse::new(Question::from(row))))
}

/// DELETE /questions/:question_id
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::Admin).await?;

    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Question not found"));
    }

    Ok(Json(MessageResponse::new("Question deleted")))
}
