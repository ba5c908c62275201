//! Survey submission domain types
//!
//! A submission is one filled-out survey instance for one property and visit
//! date. Submissions are mutable only while in draft; finalization stamps
//! `submitted_at` and freezes the responses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::ScoreBreakdown;

/// Submission status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Reviewed,
}

impl SubmissionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "reviewed" => Some(Self::Reviewed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Reviewed => "reviewed",
        }
    }
}

/// Submission entity. Exactly one of `submitted_by` / `guest_link_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub template_id: Uuid,
    pub property_id: Uuid,
    pub visit_date: NaiveDate,
    pub status: SubmissionStatus,
    pub submitted_by: Option<Uuid>,
    pub guest_link_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub notes: Option<String>,
    /// Set only on the transition away from draft
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One answered question within a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub question_id: Uuid,
    pub score: i32,
    pub note: Option<String>,
    /// Internal surveys only; a non-empty value justifies task escalation
    pub issue_description: Option<String>,
}

/// Request DTO for creating a draft submission
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubmissionRequest {
    pub template_id: Uuid,
    pub visit_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One response as supplied by the client
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseInput {
    pub question_id: Uuid,
    pub score: i32,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub issue_description: Option<String>,
}

/// Request DTO replacing a draft submission's responses
#[derive(Debug, Clone, Deserialize)]
pub struct SaveResponsesRequest {
    pub responses: Vec<ResponseInput>,
}

/// Request DTO for a public guest submission against an issued guest link
#[derive(Debug, Clone, Deserialize)]
pub struct GuestSubmissionRequest {
    pub guest_name: String,
    #[serde(default)]
    pub guest_email: Option<String>,
    pub visit_date: NaiveDate,
    pub responses: Vec<ResponseInput>,
}

/// Response DTO for a submission, including computed scores
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub template_id: Uuid,
    pub property_id: Uuid,
    pub visit_date: NaiveDate,
    pub status: SubmissionStatus,
    pub submitted_by: Option<Uuid>,
    pub guest_link_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub notes: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub score: ScoreBreakdown,
}

/// Row-level summary for list endpoints (no response join)
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub id: Uuid,
    pub template_id: Uuid,
    pub property_id: Uuid,
    pub visit_date: NaiveDate,
    pub status: SubmissionStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub overall_score: f64,
}
