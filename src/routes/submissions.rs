//! Survey submission routes
//!
//! Drafts are created per property and visit date, responses are saved while
//! the submission is in draft, and finalization freezes the submission,
//! computes scores, and kicks off task escalation for internal surveys.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::{authorize, Access, AuthorizedCaller, RequireAuth, Role};
use crate::domain::submissions::{
    CreateSubmissionRequest, ResponseInput, SaveResponsesRequest, Submission, SubmissionResponse,
    SubmissionStatus, SubmissionSummary, SurveyResponse,
};
use crate::domain::templates::TemplateTree;
use crate::error::ApiError;
use crate::routes::templates::load_template_tree;
use crate::scoring::{self, ScoreBreakdown, ScoringError, SliceRow};
use crate::services::cache::keys;
use crate::services::notifications;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubmissionRow {
    id: Uuid,
    template_id: Uuid,
    property_id: Uuid,
    visit_date: NaiveDate,
    status: String,
    submitted_by: Option<Uuid>,
    guest_link_id: Option<Uuid>,
    guest_name: Option<String>,
    guest_email: Option<String>,
    notes: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = ApiError;

    fn try_from(row: SubmissionRow) -> Result<Self, ApiError> {
        let status = SubmissionStatus::parse(&row.status).ok_or_else(|| {
            ApiError::internal(format!("Unknown submission status {}", row.status))
        })?;

        Ok(Self {
            id: row.id,
            template_id: row.template_id,
            property_id: row.property_id,
            visit_date: row.visit_date,
            status,
            submitted_by: row.submitted_by,
            guest_link_id: row.guest_link_id,
            guest_name: row.guest_name,
            guest_email: row.guest_email,
            notes: row.notes,
            submitted_at: row.submitted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResponseRow {
    id: Uuid,
    submission_id: Uuid,
    question_id: Uuid,
    score: i32,
    note: Option<String>,
    issue_description: Option<String>,
}

impl From<ResponseRow> for SurveyResponse {
    fn from(row: ResponseRow) -> Self {
        Self {
            id: row.id,
            submission_id: row.submission_id,
            question_id: row.question_id,
            score: row.score,
            note: row.note,
            issue_description: row.issue_description,
        }
    }
}

const SUBMISSION_COLUMNS: &str = "id, template_id, property_id, visit_date, status, \
     submitted_by, guest_link_id, guest_name, guest_email, notes, \
     submitted_at, created_at, updated_at";

pub(crate) async fn load_submission(db: &PgPool, id: Uuid) -> Result<Submission, ApiError> {
    let row = sqlx::query_as::<_, SubmissionRow>(&format!(
        "SELECT {} FROM submissions WHERE id = $1",
        SUBMISSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Submission not found"))?;

    row.try_into()
}

pub(crate) async fn load_responses(
    db: &PgPool,
    submission_id: Uuid,
) -> Result<Vec<SurveyResponse>, ApiError> {
    let rows = sqlx::query_as::<_, ResponseRow>(
        r#"
        SELECT id, submission_id, question_id, score, note, issue_description
        FROM responses WHERE submission_id = $1
        "#,
    )
    .bind(submission_id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Validate a response batch against the template tree: every question must
/// exist, appear at most once, and the score must lie within its scale.
pub(crate) fn validate_response_inputs(
    tree: &TemplateTree,
    inputs: &[ResponseInput],
) -> Result<(), ApiError> {
    let mut seen = HashSet::new();

    for input in inputs {
        if !seen.insert(input.question_id) {
            return Err(ApiError::validation(
                "responses",
                format!("duplicate response for question {}", input.question_id),
            ));
        }

        let question = tree
            .find_question(input.question_id)
            .ok_or_else(|| ApiError::not_found(format!("Question {} not found", input.question_id)))?;

        if input.score < question.scale_min || input.score > question.scale_max {
            return Err(ApiError::validation(
                "score",
                format!(
                    "score {} for question {} is outside its scale [{}, {}]",
                    input.score, input.question_id, question.scale_min, question.scale_max
                ),
            ));
        }
    }

    Ok(())
}

/// Every required question must have an answer before finalization.
pub(crate) fn validate_required_answered(
    tree: &TemplateTree,
    answered: &HashSet<Uuid>,
) -> Result<(), ApiError> {
    for question in tree.questions() {
        if question.is_required && !answered.contains(&question.id) {
            return Err(ApiError::validation(
                "responses",
                format!("required question {} is unanswered", question.id),
            ));
        }
    }
    Ok(())
}

/// Run the scoring engine over one submission's responses.
pub(crate) fn score_submission(
    tree: &TemplateTree,
    responses: &[SurveyResponse],
) -> Result<ScoreBreakdown, ApiError> {
    let structure = tree.scoring_structure();
    let scored: Vec<scoring::ScoredResponse> = responses
        .iter()
        .map(|r| scoring::ScoredResponse {
            question_id: r.question_id,
            score: r.score,
        })
        .collect();

    scoring::score_responses(&structure, &scored).map_err(|e| match e {
        ScoringError::UnknownQuestion(id) => {
            ApiError::not_found(format!("Question {} not found in template", id))
        }
    })
}

pub(crate) fn submission_response(
    submission: Submission,
    score: ScoreBreakdown,
) -> SubmissionResponse {
    SubmissionResponse {
        id: submission.id,
        template_id: submission.template_id,
        property_id: submission.property_id,
        visit_date: submission.visit_date,
        status: submission.status,
        submitted_by: submission.submitted_by,
        guest_link_id: submission.guest_link_id,
        guest_name: submission.guest_name,
        notes: submission.notes,
        submitted_at: submission.submitted_at,
        created_at: submission.created_at,
        score,
    }
}

/// Replace a submission's responses in one transaction.
pub(crate) async fn replace_responses(
    db: &PgPool,
    submission_id: Uuid,
    inputs: &[ResponseInput],
) -> Result<Vec<SurveyResponse>, ApiError> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM responses WHERE submission_id = $1")
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

    let mut saved = Vec::with_capacity(inputs.len());
    for input in inputs {
        let row = sqlx::query_as::<_, ResponseRow>(
            r#"
            INSERT INTO responses (id, submission_id, question_id, score, note, issue_description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, submission_id, question_id, score, note, issue_description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(submission_id)
        .bind(input.question_id)
        .bind(input.score)
        .bind(&input.note)
        .bind(&input.issue_description)
        .fetch_one(&mut *tx)
        .await?;

        saved.push(SurveyResponse::from(row));
    }

    tx.commit().await?;
    Ok(saved)
}

fn can_edit(caller: &AuthorizedCaller, submission: &Submission) -> bool {
    caller.role == Role::Admin || submission.submitted_by == Some(caller.user_id)
}

// ============================================================================
// Submission Endpoints
// ============================================================================

/// POST /properties/:property_id/submissions
///
/// Create a draft submission.
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::SubmitForProperty(property_id)).await?;

    let tree = load_template_tree(&state.db, req.template_id).await?;
    if !tree.template.is_active {
        return Err(ApiError::validation("template_id", "template is inactive"));
    }

    let row = sqlx::query_as::<_, SubmissionRow>(&format!(
        r#"
        INSERT INTO submissions (id, template_id, property_id, visit_date, status,
                                 submitted_by, notes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'draft', $5, $6, NOW(), NOW())
        RETURNING {}
        "#,
        SUBMISSION_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(req.template_id)
    .bind(property_id)
    .bind(req.visit_date)
    .bind(auth.user_id)
    .bind(&req.notes)
    .fetch_one(&state.db)
    .await?;

    let submission = Submission::try_from(row)?;
    let score = score_submission(&tree, &[])?;

    Ok(Created(DataResponse::new(submission_response(
        submission, score,
    ))))
}

/// PUT /submissions/:submission_id/responses
///
/// Replace the responses of a draft submission. Scores are validated against
/// each question's scale here, at the boundary.
pub async fn save_responses(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
    auth: RequireAuth,
    Json(req): Json<SaveResponsesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let submission = load_submission(&state.db, submission_id).await?;
    let caller = authorize(
        &state.db,
        &auth,
        Access::SubmitForProperty(submission.property_id),
    )
    .await?;

    if !can_edit(&caller, &submission) {
        return Err(ApiError::forbidden("Only the submitter may edit a draft"));
    }
    if submission.status != SubmissionStatus::Draft {
        return Err(ApiError::conflict("Submission is no longer a draft"));
    }

    let tree = load_template_tree(&state.db, submission.template_id).await?;
    validate_response_inputs(&tree, &req.responses)?;

    let responses = replace_responses(&state.db, submission_id, &req.responses).await?;
    let score = score_submission(&tree, &responses)?;

    Ok(Json(DataResponse::new(submission_response(
        submission, score,
    ))))
}

/// POST /submissions/:submission_id/finalize
///
/// Transition draft -> submitted. The status check runs against the row as
/// persisted, in the UPDATE itself, so competing finalizations cannot both
/// succeed. Task escalation and cache invalidation are best-effort side
/// effects; their failure never rolls back the finalization.
pub async fn finalize_submission(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let submission = load_submission(&state.db, submission_id).await?;
    let caller = authorize(
        &state.db,
        &auth,
        Access::SubmitForProperty(submission.property_id),
    )
    .await?;

    if !can_edit(&caller, &submission) {
        return Err(ApiError::forbidden("Only the submitter may finalize a draft"));
    }

    let tree = load_template_tree(&state.db, submission.template_id).await?;
    let responses = load_responses(&state.db, submission_id).await?;

    let answered: HashSet<Uuid> = responses.iter().map(|r| r.question_id).collect();
    validate_required_answered(&tree, &answered)?;
    let score = score_submission(&tree, &responses)?;

    let row = sqlx::query_as::<_, SubmissionRow>(&format!(
        r#"
        UPDATE submissions
        SET status = 'submitted', submitted_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'draft'
        RETURNING {}
        "#,
        SUBMISSION_COLUMNS
    ))
    .bind(submission_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::conflict("Submission is no longer a draft"))?;

    let submission = Submission::try_from(row)?;

    run_post_finalization(&state, &submission, &tree, &responses).await;

    Ok(Json(DataResponse::new(submission_response(
        submission, score,
    ))))
}

/// Best-effort side effects of finalization: task escalation for internal
/// surveys, notification rows for the created tasks, and dashboard cache
/// invalidation. Failures are logged and swallowed; operators reconcile
/// manually.
pub(crate) async fn run_post_finalization(
    state: &AppState,
    submission: &Submission,
    tree: &TemplateTree,
    responses: &[SurveyResponse],
) {
    match state
        .escalation
        .evaluate(submission, tree.template.survey_kind, tree, responses)
        .await
    {
        Ok(tasks) if !tasks.is_empty() => {
            let property_name: String =
                sqlx::query_scalar("SELECT name FROM properties WHERE id = $1")
                    .bind(submission.property_id)
                    .fetch_optional(&state.db)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default();

            for task in &tasks {
                if let Err(e) =
                    notifications::notify_task_created(&state.db, task, &property_name).await
                {
                    tracing::warn!(
                        task_id = %task.id,
                        error = %e,
                        "Failed to create task notification"
                    );
                }
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(
                submission_id = %submission.id,
                error = %e,
                "Task escalation failed; submission remains finalized"
            );
        }
    }

    if let Err(e) = state.cache.delete_pattern(&keys::dashboard_pattern()).await {
        tracing::warn!(error = %e, "Failed to invalidate dashboard cache");
    }
}

/// GET /submissions/:submission_id
///
/// Submission detail with its computed score breakdown.
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let submission = load_submission(&state.db, submission_id).await?;
    authorize(
        &state.db,
        &auth,
        Access::SubmitForProperty(submission.property_id),
    )
    .await?;

    let tree = load_template_tree(&state.db, submission.template_id).await?;
    let responses = load_responses(&state.db, submission_id).await?;
    let score = score_submission(&tree, &responses)?;

    Ok(Json(DataResponse::new(submission_response(
        submission, score,
    ))))
}

#[derive(Debug, sqlx::FromRow)]
struct SubmissionSliceRow {
    submission_id: Uuid,
    category_id: Uuid,
    weight: rust_decimal::Decimal,
    question_id: Uuid,
    scale_min: i32,
    scale_max: i32,
    score: i32,
}

/// GET /properties/:property_id/submissions
///
/// List submissions for a property, newest visit first, with each row's
/// overall score.
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::SubmitForProperty(property_id)).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE property_id = $1")
        .bind(property_id)
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
        r#"
        SELECT {}
        FROM submissions
        WHERE property_id = $1
        ORDER BY visit_date DESC, created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        SUBMISSION_COLUMNS
    ))
    .bind(property_id)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let submissions = rows
        .into_iter()
        .map(Submission::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<Uuid> = submissions.iter().map(|s| s.id).collect();

    let slice_rows = sqlx::query_as::<_, SubmissionSliceRow>(
        r#"
        SELECT r.submission_id, c.id AS category_id, c.weight,
               q.id AS question_id, q.scale_min, q.scale_max, r.score
        FROM responses r
        JOIN questions q ON q.id = r.question_id
        JOIN subcategories sc ON sc.id = q.subcategory_id
        JOIN categories c ON c.id = sc.category_id
        WHERE r.submission_id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<SubmissionSummary> = submissions
        .into_iter()
        .map(|s| {
            let rows: Vec<SliceRow> = slice_rows
                .iter()
                .filter(|r| r.submission_id == s.id)
                .map(|r| SliceRow {
                    category_id: r.category_id,
                    weight: decimal_to_f64(r.weight),
                    question_id: r.question_id,
                    scale_min: r.scale_min,
                    scale_max: r.scale_max,
                    score: r.score,
                })
                .collect();

            SubmissionSummary {
                id: s.id,
                template_id: s.template_id,
                property_id: s.property_id,
                visit_date: s.visit_date,
                status: s.status,
                submitted_at: s.submitted_at,
                overall_score: scoring::score_slice(&rows),
            }
        })
        .collect();

    Ok(Paginated::new(data, &pagination, total as u64))
}

pub(crate) fn decimal_to_f64(d: rust_decimal::Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}
