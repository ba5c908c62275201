//! Dashboard routes
//!
//! Aggregates are the survey scoring engine applied to different response
//! slices: org-wide, per property, per month. No slice gets its own
//! arithmetic. Results are cached in Redis and invalidated when a submission
//! is finalized.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::{authorize, Access, RequireAuth};
use crate::domain::templates::SurveyKind;
use crate::error::ApiError;
use crate::routes::properties::caller_organization;
use crate::scoring::{score_slice, SliceRow};
use crate::services::cache::keys;

#[derive(Debug, sqlx::FromRow)]
struct PropertySliceRow {
    property_id: Uuid,
    category_id: Uuid,
    weight: Decimal,
    question_id: Uuid,
    scale_min: i32,
    scale_max: i32,
    score: i32,
}

impl PropertySliceRow {
    fn to_slice_row(&self) -> SliceRow {
        SliceRow {
            category_id: self.category_id,
            weight: super::submissions::decimal_to_f64(self.weight),
            question_id: self.question_id,
            scale_min: self.scale_min,
            scale_max: self.scale_max,
            score: self.score,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KindFilter {
    /// Optional survey kind filter (`internal` | `guest`); all kinds when
    /// omitted.
    #[serde(default)]
    pub kind: Option<String>,
}

impl KindFilter {
    fn validate(&self) -> Result<Option<&str>, ApiError> {
        match self.kind.as_deref() {
            None => Ok(None),
            Some(s) => match SurveyKind::parse(s) {
                Some(_) => Ok(Some(s)),
                None => Err(ApiError::validation(
                    "kind",
                    "must be 'internal' or 'guest'",
                )),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyAverage {
    pub property_id: Uuid,
    pub name: String,
    pub average: f64,
    pub submission_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub overall_average: f64,
    pub properties: Vec<PropertyAverage>,
}

/// GET /dashboard/overview
///
/// Org-wide average plus per-property averages over every finalized
/// submission the caller may see.
pub async fn overview(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<KindFilter>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let caller = authorize(&state.db, &auth, Access::Authenticated).await?;
    let kind = filter.validate()?;

    let cache_key = keys::dashboard_overview(auth.user_id, kind);
    if let Some(cached) = state.cache.get::<OverviewResponse>(&cache_key).await {
        return Ok(Json(DataResponse::new(cached)));
    }

    let organization_id = caller_organization(&state.db, auth.user_id).await?;
    let visible = caller.visible_properties().map(|ids| ids.to_vec());

    #[derive(Debug, sqlx::FromRow)]
    struct PropertyCountRow {
        id: Uuid,
        name: String,
        submission_count: i64,
    }

    let properties = sqlx::query_as::<_, PropertyCountRow>(
        r#"
        SELECT p.id, p.name,
               (SELECT COUNT(*) FROM submissions s
                JOIN templates t ON t.id = s.template_id
                WHERE s.property_id = p.id
                  AND s.status <> 'draft'
                  AND ($3::text IS NULL OR t.survey_kind = $3)) AS submission_count
        FROM properties p
        WHERE p.organization_id = $1
          AND ($2::uuid[] IS NULL OR p.id = ANY($2))
        ORDER BY p.name
        "#,
    )
    .bind(organization_id)
    .bind(&visible)
    .bind(kind)
    .fetch_all(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, PropertySliceRow>(
        r#"
        SELECT s.property_id, c.id AS category_id, c.weight,
               q.id AS question_id, q.scale_min, q.scale_max, r.score
        FROM responses r
        JOIN submissions s ON s.id = r.submission_id
        JOIN templates t ON t.id = s.template_id
        JOIN questions q ON q.id = r.question_id
        JOIN subcategories sc ON sc.id = q.subcategory_id
        JOIN categories c ON c.id = sc.category_id
        JOIN properties p ON p.id = s.property_id
        WHERE p.organization_id = $1
          AND ($2::uuid[] IS NULL OR s.property_id = ANY($2))
          AND s.status <> 'draft'
          AND ($3::text IS NULL OR t.survey_kind = $3)
        "#,
    )
    .bind(organization_id)
    .bind(&visible)
    .bind(kind)
    .fetch_all(&state.db)
    .await?;

    let all_rows: Vec<SliceRow> = rows.iter().map(PropertySliceRow::to_slice_row).collect();
    let overall_average = score_slice(&all_rows);

    let properties = properties
        .into_iter()
        .map(|p| {
            let slice: Vec<SliceRow> = rows
                .iter()
                .filter(|r| r.property_id == p.id)
                .map(PropertySliceRow::to_slice_row)
                .collect();

            PropertyAverage {
                property_id: p.id,
                name: p.name,
                average: score_slice(&slice),
                submission_count: p.submission_count,
            }
        })
        .collect();

    let response = OverviewResponse {
        overall_average,
        properties,
    };

    if let Err(e) = state.cache.set(&cache_key, &response).await {
        tracing::warn!(error = %e, "Failed to cache dashboard overview");
    }

    Ok(Json(DataResponse::new(response)))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TrendParams {
    #[serde(default)]
    pub months: Option<u32>,
    #[serde(flatten)]
    pub filter: KindFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    /// First day of the month the point covers.
    pub month: NaiveDate,
    pub average: f64,
    pub answered_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendResponse {
    pub property_id: Uuid,
    pub months: u32,
    /// Oldest month first.
    pub series: Vec<TrendPoint>,
}

async fn month_slice(
    db: &PgPool,
    property_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    kind: Option<&str>,
) -> Result<Vec<SliceRow>, ApiError> {
    let rows = sqlx::query_as::<_, PropertySliceRow>(
        r#"
        SELECT s.property_id, c.id AS category_id, c.weight,
               q.id AS question_id, q.scale_min, q.scale_max, r.score
        FROM responses r
        JOIN submissions s ON s.id = r.submission_id
        JOIN templates t ON t.id = s.template_id
        JOIN questions q ON q.id = r.question_id
        JOIN subcategories sc ON sc.id = q.subcategory_id
        JOIN categories c ON c.id = sc.category_id
        WHERE s.property_id = $1
          AND s.status <> 'draft'
          AND s.visit_date >= $2 AND s.visit_date < $3
          AND ($4::text IS NULL OR t.survey_kind = $4)
        "#,
    )
    .bind(property_id)
    .bind(start)
    .bind(end)
    .bind(kind)
    .fetch_all(db)
    .await?;

    Ok(rows.iter().map(PropertySliceRow::to_slice_row).collect())
}

/// GET /dashboard/properties/:property_id/trend?months=N
///
/// Per-month score series for one property. Months are fetched concurrently
/// and each is scored with the same engine as every other slice.
pub async fn property_trend(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<Uuid>,
    Query(params): Query<TrendParams>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.db, &auth, Access::SubmitForProperty(property_id)).await?;
    let kind = params.filter.validate()?;
    let months = params.months.unwrap_or(6).clamp(1, 24);

    let cache_key = keys::property_trend(property_id, months, kind);
    if let Some(cached) = state.cache.get::<TrendResponse>(&cache_key).await {
        return Ok(Json(DataResponse::new(cached)));
    }

    let today = Utc::now().date_naive();
    let current_month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .ok_or_else(|| ApiError::internal("Invalid current date"))?;

    // Oldest month first
    let mut windows = Vec::with_capacity(months as usize);
    for back in (0..months).rev() {
        let start = current_month_start
            .checked_sub_months(Months::new(back))
            .ok_or_else(|| ApiError::internal("Month window underflow"))?;
        let end = start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| ApiError::internal("Month window overflow"))?;
        windows.push((start, end));
    }

    let slices = try_join_all(
        windows
            .iter()
            .map(|&(start, end)| month_slice(&state.db, property_id, start, end, kind)),
    )
    .await?;

    let series = windows
        .iter()
        .zip(slices)
        .map(|(&(start, _), slice)| TrendPoint {
            month: start,
            average: score_slice(&slice),
            answered_count: slice.len(),
        })
        .collect();

    let response = TrendResponse {
        property_id,
        months,
        series,
    };

    if let Err(e) = state.cache.set(&cache_key, &response).await {
        tracing::warn!(error = %e, "Failed to cache property trend");
    }

    Ok(Json(DataResponse::new(response)))
}
