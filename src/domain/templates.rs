//! Survey template domain types
//!
//! Templates are admin-defined survey definitions: an ordered tree of
//! categories, subcategories, and questions. Survey takers never touch these.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring;

/// Survey kind enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurveyKind {
    Internal,
    Guest,
}

impl SurveyKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "internal" => Some(Self::Internal),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Guest => "guest",
        }
    }
}

/// Template entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub version: i32,
    pub survey_kind: SurveyKind,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category entity. Weight feeds the weighted overall score; must be > 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub weight: Decimal,
    pub sort_order: i32,
}

/// Subcategory entity. An empty name means "no subcategory" and is collapsed
/// in presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub sort_order: i32,
}

/// Question entity with its native integer scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub subcategory_id: Uuid,
    pub prompt: String,
    pub description: Option<String>,
    pub scale_min: i32,
    pub scale_max: i32,
    pub is_required: bool,
    pub sort_order: i32,
}

/// Full ordered template tree, as served to survey-taking clients.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateTree {
    #[serde(flatten)]
    pub template: Template,
    pub categories: Vec<CategoryNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<SubcategoryNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategoryNode {
    #[serde(flatten)]
    pub subcategory: Subcategory,
    pub questions: Vec<Question>,
}

impl TemplateTree {
    /// Flatten the tree into the structures the scoring engine consumes.
    pub fn scoring_structure(&self) -> Vec<scoring::CategoryStructure> {
        self.categories
            .iter()
            .map(|node| scoring::CategoryStructure {
                category_id: node.category.id,
                weight: node.category.weight.to_f64().unwrap_or(0.0),
                questions: node
                    .subcategories
                    .iter()
                    .flat_map(|sub| sub.questions.iter())
                    .map(|q| scoring::QuestionStructure {
                        question_id: q.id,
                        scale_min: q.scale_min,
                        scale_max: q.scale_max,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Look up one question anywhere in the tree.
    pub fn find_question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions().find(|q| q.id == question_id)
    }

    /// Iterate every question in display order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.categories
            .iter()
            .flat_map(|node| node.subcategories.iter())
            .flat_map(|sub| sub.questions.iter())
    }
}

/// Request DTO for creating a template
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub survey_kind: SurveyKind,
}

/// Request DTO for updating a template
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Request DTO for creating a category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    /// Defaults to 1.0 when omitted
    #[serde(default)]
    pub weight: Option<Decimal>,
    pub sort_order: i32,
}

/// Request DTO for updating a category
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Request DTO for creating a subcategory
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubcategoryRequest {
    /// Empty string is permitted and means "no subcategory"
    #[serde(default)]
    pub name: String,
    pub sort_order: i32,
}

/// Request DTO for creating a question
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestionRequest {
    pub prompt: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scale_min: i32,
    pub scale_max: i32,
    #[serde(default)]
    pub is_required: bool,
    pub sort_order: i32,
}

/// Request DTO for updating a question
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateQuestionRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}
