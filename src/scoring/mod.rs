//! Survey scoring engine.
//!
//! Pure functions that turn a template's category/question structure plus a
//! set of responses into comparable scores on a fixed 0-10 scale. The engine
//! performs no I/O and the same inputs always produce identical output, so
//! dashboards re-run it freely over arbitrary response slices.
//!
//! Values are returned at full floating-point precision; display rounding is
//! the caller's job.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Flattened question as the engine sees it: identity plus native scale.
#[derive(Debug, Clone, Copy)]
pub struct QuestionStructure {
    pub question_id: Uuid,
    pub scale_min: i32,
    pub scale_max: i32,
}

/// One category with its weight and the questions under it. Subcategories
/// are presentation grouping only and are flattened away before scoring.
#[derive(Debug, Clone)]
pub struct CategoryStructure {
    pub category_id: Uuid,
    pub weight: f64,
    pub questions: Vec<QuestionStructure>,
}

/// One answered question. A pooled dashboard slice may carry several
/// responses to the same question; each contributes individually.
#[derive(Debug, Clone, Copy)]
pub struct ScoredResponse {
    pub question_id: Uuid,
    pub score: i32,
}

/// Per-category result. `average` is `None` when nobody answered any
/// question in the category; that is normal output, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryScore {
    pub category_id: Uuid,
    pub average: Option<f64>,
    pub answered_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub overall_score: f64,
    pub category_scores: Vec<CategoryScore>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("response references unknown question {0}")]
    UnknownQuestion(Uuid),
}

/// Rescale a native-scale score onto 0-10.
///
/// This is what lets questions with heterogeneous scales (1-5 next to 0-10)
/// be averaged together.
pub fn normalize(score: i32, scale_min: i32, scale_max: i32) -> f64 {
    ((score - scale_min) as f64 / (scale_max - scale_min) as f64) * 10.0
}

/// Score one set of responses against a category structure.
///
/// A category with zero answered questions is excluded from the overall
/// weighted sum and its divisor, never treated as zero. When no category has
/// any answer at all, `overall_score` collapses to a 0.0 floor while every
/// per-category average stays `None`; the asymmetry is intentional and
/// empty-state rendering depends on it.
pub fn score_responses(
    categories: &[CategoryStructure],
    responses: &[ScoredResponse],
) -> Result<ScoreBreakdown, ScoringError> {
    // question -> (category index, scale)
    let mut questions: HashMap<Uuid, (usize, i32, i32)> = HashMap::new();
    for (idx, category) in categories.iter().enumerate() {
        for q in &category.questions {
            questions.insert(q.question_id, (idx, q.scale_min, q.scale_max));
        }
    }

    let mut sums = vec![0.0_f64; categories.len()];
    let mut counts = vec![0_u32; categories.len()];

    for response in responses {
        let (idx, min, max) = *questions
            .get(&response.question_id)
            .ok_or(ScoringError::UnknownQuestion(response.question_id))?;
        sums[idx] += normalize(response.score, min, max);
        counts[idx] += 1;
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut category_scores = Vec::with_capacity(categories.len());

    for (idx, category) in categories.iter().enumerate() {
        let average = if counts[idx] > 0 {
            Some(sums[idx] / counts[idx] as f64)
        } else {
            None
        };

        if let Some(avg) = average {
            weighted_sum += avg * category.weight;
            weight_total += category.weight;
        }

        category_scores.push(CategoryScore {
            category_id: category.category_id,
            average,
            answered_count: counts[idx],
        });
    }

    let overall_score = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };

    Ok(ScoreBreakdown {
        overall_score,
        category_scores,
    })
}

/// One joined response row from a dashboard slice: the answered score plus
/// the scale and category weight it was answered under.
#[derive(Debug, Clone)]
pub struct SliceRow {
    pub category_id: Uuid,
    pub weight: f64,
    pub question_id: Uuid,
    pub scale_min: i32,
    pub scale_max: i32,
    pub score: i32,
}

/// Score an arbitrary response slice (per property, per month, org-wide).
///
/// Rebuilds the category structure the rows were answered under and runs
/// [`score_responses`] on it; slices never get their own arithmetic. An
/// empty slice yields the 0.0 floor.
pub fn score_slice(rows: &[SliceRow]) -> f64 {
    let mut categories: Vec<CategoryStructure> = Vec::new();
    let mut category_index: HashMap<Uuid, usize> = HashMap::new();
    let mut seen_questions: HashSet<Uuid> = HashSet::new();
    let mut responses = Vec::with_capacity(rows.len());

    for row in rows {
        let idx = *category_index.entry(row.category_id).or_insert_with(|| {
            categories.push(CategoryStructure {
                category_id: row.category_id,
                weight: row.weight,
                questions: Vec::new(),
            });
            categories.len() - 1
        });

        if seen_questions.insert(row.question_id) {
            categories[idx].questions.push(QuestionStructure {
                question_id: row.question_id,
                scale_min: row.scale_min,
                scale_max: row.scale_max,
            });
        }

        responses.push(ScoredResponse {
            question_id: row.question_id,
            score: row.score,
        });
    }

    // Every question was registered above, so the engine cannot miss one.
    score_responses(&categories, &responses)
        .map(|breakdown| breakdown.overall_score)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(weight: f64, questions: Vec<QuestionStructure>) -> CategoryStructure {
        CategoryStructure {
            category_id: Uuid::new_v4(),
            weight,
            questions,
        }
    }

    fn question(scale_min: i32, scale_max: i32) -> QuestionStructure {
        QuestionStructure {
            question_id: Uuid::new_v4(),
            scale_min,
            scale_max,
        }
    }

    #[test]
    fn normalize_hits_both_endpoints() {
        assert_eq!(normalize(1, 1, 10), 0.0);
        assert_eq!(normalize(10, 1, 10), 10.0);
        assert_eq!(normalize(0, 0, 10), 0.0);
        assert_eq!(normalize(5, 0, 10), 5.0);
        assert_eq!(normalize(3, 1, 5), 5.0);
    }

    #[test]
    fn unknown_question_is_an_error() {
        let categories = vec![category(1.0, vec![question(1, 10)])];
        let stray = Uuid::new_v4();
        let err = score_responses(
            &categories,
            &[ScoredResponse {
                question_id: stray,
                score: 5,
            }],
        )
        .unwrap_err();
        assert_eq!(err, ScoringError::UnknownQuestion(stray));
    }

    #[test]
    fn unanswered_questions_do_not_dilute_the_average() {
        let answered = question(1, 10);
        let unanswered = question(1, 10);
        let categories = vec![category(1.0, vec![answered, unanswered])];

        let breakdown = score_responses(
            &categories,
            &[ScoredResponse {
                question_id: answered.question_id,
                score: 10,
            }],
        )
        .unwrap();

        assert_eq!(breakdown.category_scores[0].answered_count, 1);
        assert_eq!(breakdown.category_scores[0].average, Some(10.0));
        assert_eq!(breakdown.overall_score, 10.0);
    }

    #[test]
    fn slice_pools_repeated_questions_individually() {
        let q = question(0, 10);
        let category_id = Uuid::new_v4();
        let rows: Vec<SliceRow> = [4, 6, 8]
            .iter()
            .map(|&score| SliceRow {
                category_id,
                weight: 1.0,
                question_id: q.question_id,
                scale_min: q.scale_min,
                scale_max: q.scale_max,
                score,
            })
            .collect();

        // Three answers to one question average like three separate answers.
        assert!((score_slice(&rows) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn empty_slice_scores_the_floor() {
        assert_eq!(score_slice(&[]), 0.0);
    }
}
