//! Integration tests for the survey scoring engine.

use stayqa_backend::scoring::{
    normalize, score_responses, score_slice, CategoryStructure, QuestionStructure, ScoredResponse,
    SliceRow,
};
use uuid::Uuid;

fn question(scale_min: i32, scale_max: i32) -> QuestionStructure {
    QuestionStructure {
        question_id: Uuid::new_v4(),
        scale_min,
        scale_max,
    }
}

fn category(weight: f64, questions: Vec<QuestionStructure>) -> CategoryStructure {
    CategoryStructure {
        category_id: Uuid::new_v4(),
        weight,
        questions,
    }
}

fn answer(q: &QuestionStructure, score: i32) -> ScoredResponse {
    ScoredResponse {
        question_id: q.question_id,
        score,
    }
}

#[test]
fn normalization_spans_zero_to_ten_for_any_scale() {
    for (min, max) in [(1, 10), (0, 10), (1, 5), (0, 100)] {
        assert_eq!(normalize(min, min, max), 0.0);
        assert_eq!(normalize(max, min, max), 10.0);

        for score in min..=max {
            let n = normalize(score, min, max);
            assert!((0.0..=10.0).contains(&n), "normalize({score}, {min}, {max}) = {n}");
        }
    }
}

#[test]
fn housekeeping_and_food_beverage_scenario() {
    // Housekeeping, weight 2.0, two questions on [1, 10] scoring 8 and 4
    let hk_q1 = question(1, 10);
    let hk_q2 = question(1, 10);
    // F&B, weight 1.0, one question on [0, 10] scoring 9
    let fb_q = question(0, 10);

    let categories = vec![
        category(2.0, vec![hk_q1, hk_q2]),
        category(1.0, vec![fb_q]),
    ];
    let responses = vec![answer(&hk_q1, 8), answer(&hk_q2, 4), answer(&fb_q, 9)];

    let breakdown = score_responses(&categories, &responses).unwrap();

    let hk_avg = breakdown.category_scores[0].average.unwrap();
    let fb_avg = breakdown.category_scores[1].average.unwrap();

    assert!((hk_avg - 5.5555).abs() < 1e-3, "housekeeping avg {hk_avg}");
    assert!((fb_avg - 9.0).abs() < 1e-12, "f&b avg {fb_avg}");
    assert!(
        (breakdown.overall_score - 6.7037).abs() < 1e-3,
        "overall {}",
        breakdown.overall_score
    );

    // Display rounding is the caller's; one decimal place here
    assert_eq!((breakdown.overall_score * 10.0).round() / 10.0, 6.7);
}

#[test]
fn empty_category_is_excluded_not_zeroed() {
    let answered_q = question(1, 10);
    let with_empty = vec![
        category(1.0, vec![answered_q]),
        // Heavily weighted category nobody answered
        category(5.0, vec![question(1, 10)]),
    ];
    let without_empty = vec![with_empty[0].clone()];

    let responses = vec![answer(&answered_q, 9)];

    let a = score_responses(&with_empty, &responses).unwrap();
    let b = score_responses(&without_empty, &responses).unwrap();

    assert_eq!(a.overall_score, b.overall_score);
    assert_eq!(a.category_scores[1].average, None);
    assert_eq!(a.category_scores[1].answered_count, 0);
}

#[test]
fn doubling_a_weight_pulls_overall_toward_that_category() {
    let q1 = question(1, 10);
    let q2 = question(1, 10);
    let responses = vec![answer(&q1, 10), answer(&q2, 2)];

    let baseline = score_responses(
        &[category(1.0, vec![q1]), category(1.0, vec![q2])],
        &responses,
    )
    .unwrap();
    let doubled = score_responses(
        &[category(2.0, vec![q1]), category(1.0, vec![q2])],
        &responses,
    )
    .unwrap();

    let first_avg = baseline.category_scores[0].average.unwrap();
    assert!(
        (doubled.overall_score - first_avg).abs() < (baseline.overall_score - first_avg).abs(),
        "doubling weight should move overall toward the category average"
    );
}

#[test]
fn empty_submission_scores_the_floor_with_undefined_averages() {
    let categories = vec![
        category(1.0, vec![question(1, 10)]),
        category(3.0, vec![question(0, 10)]),
    ];

    let breakdown = score_responses(&categories, &[]).unwrap();

    // The overall floor is 0.0 while every category average stays undefined;
    // the asymmetry is load-bearing for empty-state rendering
    assert_eq!(breakdown.overall_score, 0.0);
    for score in &breakdown.category_scores {
        assert_eq!(score.average, None);
        assert_eq!(score.answered_count, 0);
    }
}

#[test]
fn heterogeneous_scales_average_on_the_common_range() {
    let narrow = question(1, 5);
    let wide = question(0, 100);
    let categories = vec![category(1.0, vec![narrow, wide])];

    // 3 on [1,5] and 50 on [0,100] both normalize to 5.0
    let responses = vec![answer(&narrow, 3), answer(&wide, 50)];
    let breakdown = score_responses(&categories, &responses).unwrap();

    assert_eq!(breakdown.category_scores[0].average, Some(5.0));
    assert_eq!(breakdown.overall_score, 5.0);
}

#[test]
fn slice_scoring_matches_structured_scoring() {
    let q1 = question(1, 10);
    let q2 = question(0, 10);
    let c1 = category(2.0, vec![q1]);
    let c2 = category(1.0, vec![q2]);

    let structured = score_responses(
        &[c1.clone(), c2.clone()],
        &[answer(&q1, 7), answer(&q2, 4)],
    )
    .unwrap();

    let rows = vec![
        SliceRow {
            category_id: c1.category_id,
            weight: c1.weight,
            question_id: q1.question_id,
            scale_min: q1.scale_min,
            scale_max: q1.scale_max,
            score: 7,
        },
        SliceRow {
            category_id: c2.category_id,
            weight: c2.weight,
            question_id: q2.question_id,
            scale_min: q2.scale_min,
            scale_max: q2.scale_max,
            score: 4,
        },
    ];

    assert_eq!(score_slice(&rows), structured.overall_score);
}
