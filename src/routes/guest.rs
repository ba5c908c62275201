//! Public guest submission route
//!
//! Guests arrive through pre-issued links; issuing links is out of scope
//! here, accepting a submission against an existing active link is in.
//! Guest submissions are finalized on receipt (no draft phase over a public
//! link) and never escalate into tasks.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::domain::submissions::{GuestSubmissionRequest, Submission};
use crate::error::ApiError;
use crate::routes::submissions::{
    score_submission, submission_response, validate_required_answered, validate_response_inputs,
};
use crate::routes::templates::load_template_tree;
use crate::services::cache::keys;

#[derive(Debug, sqlx::FromRow)]
struct GuestLinkRow {
    id: Uuid,
    template_id: Uuid,
    property_id: Uuid,
    is_active: bool,
}

/// POST /guest/:link_id/submissions
///
/// Accept a guest submission against an issued link. Public endpoint.
pub async fn create_guest_submission(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<Uuid>,
    axum::Json(req): axum::Json<GuestSubmissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let link = sqlx::query_as::<_, GuestLinkRow>(
        "SELECT id, template_id, property_id, is_active FROM guest_links WHERE id = $1",
    )
    .bind(link_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Guest link not found"))?;

    if !link.is_active {
        return Err(ApiError::not_found("Guest link is no longer active"));
    }

    if req.guest_name.trim().is_empty() {
        return Err(ApiError::validation("guest_name", "must not be empty"));
    }

    let tree = load_template_tree(&state.db, link.template_id).await?;
    if !tree.template.is_active {
        return Err(ApiError::not_found("Survey is no longer active"));
    }

    validate_response_inputs(&tree, &req.responses)?;
    let answered: HashSet<Uuid> = req.responses.iter().map(|r| r.question_id).collect();
    validate_required_answered(&tree, &answered)?;

    // Submission and responses land together; a guest never holds a draft
    let mut tx = state.db.begin().await?;

    let submission_id = Uuid::new_v4();
    let row = sqlx::query_as::<_, super::submissions::SubmissionRow>(
        r#"
        INSERT INTO submissions (id, template_id, property_id, visit_date, status,
                                 guest_link_id, guest_name, guest_email,
                                 submitted_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'submitted', $5, $6, $7, NOW(), NOW(), NOW())
        RETURNING id, template_id, property_id, visit_date, status,
                  submitted_by, guest_link_id, guest_name, guest_email, notes,
                  submitted_at, created_at, updated_at
        "#,
    )
    .bind(submission_id)
    .bind(link.template_id)
    .bind(link.property_id)
    .bind(req.visit_date)
    .bind(link.id)
    .bind(req.guest_name.trim())
    .bind(&req.guest_email)
    .fetch_one(&mut *tx)
    .await?;

    let mut responses = Vec::with_capacity(req.responses.len());
    for input in &req.responses {
        let response_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO responses (id, submission_id, question_id, score, note, issue_description)
            VALUES ($1, $2, $3, $4, $5, NULL)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(submission_id)
        .bind(input.question_id)
        .bind(input.score)
        .bind(&input.note)
        .fetch_one(&mut *tx)
        .await?;

        responses.push(crate::domain::submissions::SurveyResponse {
            id: response_id,
            submission_id,
            question_id: input.question_id,
            score: input.score,
            note: input.note.clone(),
            issue_description: None,
        });
    }

    tx.commit().await?;

    let submission = Submission::try_from(row)?;
    let score = score_submission(&tree, &responses)?;

    if let Err(e) = state.cache.delete_pattern(&keys::dashboard_pattern()).await {
        tracing::warn!(error = %e, "Failed to invalidate dashboard cache");
    }

    tracing::info!(
        submission_id = %submission.id,
        property_id = %submission.property_id,
        "Guest submission recorded"
    );

    Ok(Created(DataResponse::new(submission_response(
        submission, score,
    ))))
}
