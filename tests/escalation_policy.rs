//! Integration tests for the task escalation policy, run against an
//! in-memory store double.

use axum::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use stayqa_backend::domain::submissions::{Submission, SubmissionStatus, SurveyResponse};
use stayqa_backend::domain::tasks::{Task, TaskStatus};
use stayqa_backend::domain::templates::{
    Category, CategoryNode, Question, Subcategory, SubcategoryNode, SurveyKind, Template,
    TemplateTree,
};
use stayqa_backend::escalation::{EscalationPolicy, EscalationStore, NewTask};

#[derive(Default)]
struct InMemoryStore {
    prior_pairs: Mutex<HashSet<(Uuid, Uuid)>>,
    inserted: Mutex<Vec<NewTask>>,
    fail_inserts: bool,
}

impl InMemoryStore {
    fn with_prior(property_id: Uuid, question_id: Uuid) -> Self {
        let store = Self::default();
        store.prior_pairs.lock().insert((property_id, question_id));
        store
    }

    fn inserted(&self) -> Vec<NewTask> {
        self.inserted.lock().clone()
    }
}

#[async_trait]
impl EscalationStore for InMemoryStore {
    async fn prior_task_exists(
        &self,
        property_id: Uuid,
        question_id: Uuid,
        _lookback_days: Option<u32>,
    ) -> anyhow::Result<bool> {
        Ok(self.prior_pairs.lock().contains(&(property_id, question_id)))
    }

    async fn insert_tasks(&self, tasks: Vec<NewTask>) -> anyhow::Result<Vec<Task>> {
        if self.fail_inserts {
            anyhow::bail!("store unavailable");
        }

        let created = tasks
            .iter()
            .map(|t| Task {
                id: Uuid::new_v4(),
                submission_id: t.submission_id,
                response_id: t.response_id,
                property_id: t.property_id,
                question_id: t.question_id,
                title: t.title.clone(),
                description: Some(t.description.clone()),
                status: TaskStatus::Open,
                is_repeat_issue: t.is_repeat_issue,
                assignee_id: None,
                closing_notes: None,
                closed_by: None,
                closed_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect();

        self.inserted.lock().extend(tasks);
        Ok(created)
    }
}

fn tree_with_questions(kind: SurveyKind, questions: Vec<Question>) -> TemplateTree {
    let template_id = Uuid::new_v4();
    let category_id = Uuid::new_v4();
    let subcategory_id = questions
        .first()
        .map(|q| q.subcategory_id)
        .unwrap_or_else(Uuid::new_v4);

    TemplateTree {
        template: Template {
            id: template_id,
            organization_id: Uuid::new_v4(),
            name: "Room inspection".to_string(),
            version: 1,
            survey_kind: kind,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        categories: vec![CategoryNode {
            category: Category {
                id: category_id,
                template_id,
                name: "Housekeeping".to_string(),
                weight: Decimal::ONE,
                sort_order: 0,
            },
            subcategories: vec![SubcategoryNode {
                subcategory: Subcategory {
                    id: subcategory_id,
                    category_id,
                    name: String::new(),
                    sort_order: 0,
                },
                questions,
            }],
        }],
    }
}

fn make_question(subcategory_id: Uuid, prompt: &str) -> Question {
    Question {
        id: Uuid::new_v4(),
        subcategory_id,
        prompt: prompt.to_string(),
        description: None,
        scale_min: 1,
        scale_max: 10,
        is_required: true,
        sort_order: 0,
    }
}

fn make_submission(template_id: Uuid, property_id: Uuid) -> Submission {
    Submission {
        id: Uuid::new_v4(),
        template_id,
        property_id,
        visit_date: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
        status: SubmissionStatus::Submitted,
        submitted_by: Some(Uuid::new_v4()),
        guest_link_id: None,
        guest_name: None,
        guest_email: None,
        notes: None,
        submitted_at: Some(Utc::now()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_response(submission_id: Uuid, question_id: Uuid, score: i32, issue: Option<&str>) -> SurveyResponse {
    SurveyResponse {
        id: Uuid::new_v4(),
        submission_id,
        question_id,
        score,
        note: None,
        issue_description: issue.map(String::from),
    }
}

#[tokio::test]
async fn score_six_with_justification_creates_exactly_one_task() {
    let subcategory_id = Uuid::new_v4();
    let question = make_question(subcategory_id, "Bathroom cleanliness");
    let tree = tree_with_questions(SurveyKind::Internal, vec![question.clone()]);
    let submission = make_submission(tree.template.id, Uuid::new_v4());

    let store = Arc::new(InMemoryStore::default());
    let policy = EscalationPolicy::new(store.clone(), None);

    let responses = vec![make_response(
        submission.id,
        question.id,
        6,
        Some("Mold around the shower drain"),
    )];

    let tasks = policy
        .evaluate(&submission, SurveyKind::Internal, &tree, &responses)
        .await
        .unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Bathroom cleanliness");
    assert_eq!(tasks[0].status, TaskStatus::Open);
    assert!(!tasks[0].is_repeat_issue);
    assert_eq!(store.inserted().len(), 1);
}

#[tokio::test]
async fn score_seven_never_escalates() {
    let subcategory_id = Uuid::new_v4();
    let question = make_question(subcategory_id, "Bathroom cleanliness");
    let tree = tree_with_questions(SurveyKind::Internal, vec![question.clone()]);
    let submission = make_submission(tree.template.id, Uuid::new_v4());

    let store = Arc::new(InMemoryStore::default());
    let policy = EscalationPolicy::new(store.clone(), None);

    let responses = vec![make_response(
        submission.id,
        question.id,
        7,
        Some("Could be better"),
    )];

    let tasks = policy
        .evaluate(&submission, SurveyKind::Internal, &tree, &responses)
        .await
        .unwrap();

    assert!(tasks.is_empty());
    assert!(store.inserted().is_empty());
}

#[tokio::test]
async fn low_score_without_justification_never_escalates() {
    let subcategory_id = Uuid::new_v4();
    let question = make_question(subcategory_id, "Bathroom cleanliness");
    let tree = tree_with_questions(SurveyKind::Internal, vec![question.clone()]);
    let submission = make_submission(tree.template.id, Uuid::new_v4());

    let store = Arc::new(InMemoryStore::default());
    let policy = EscalationPolicy::new(store.clone(), None);

    for issue in [None, Some(""), Some("   ")] {
        let responses = vec![make_response(submission.id, question.id, 6, issue)];
        let tasks = policy
            .evaluate(&submission, SurveyKind::Internal, &tree, &responses)
            .await
            .unwrap();
        assert!(tasks.is_empty(), "issue {issue:?} should not escalate");
    }
}

#[tokio::test]
async fn guest_surveys_never_escalate() {
    let subcategory_id = Uuid::new_v4();
    let question = make_question(subcategory_id, "Room comfort");
    let tree = tree_with_questions(SurveyKind::Guest, vec![question.clone()]);
    let submission = make_submission(tree.template.id, Uuid::new_v4());

    let store = Arc::new(InMemoryStore::default());
    let policy = EscalationPolicy::new(store.clone(), None);

    let responses = vec![make_response(
        submission.id,
        question.id,
        1,
        Some("Terrible mattress"),
    )];

    let tasks = policy
        .evaluate(&submission, SurveyKind::Guest, &tree, &responses)
        .await
        .unwrap();

    assert!(tasks.is_empty());
    assert!(store.inserted().is_empty());
}

#[tokio::test]
async fn several_low_responses_land_in_one_batch() {
    let subcategory_id = Uuid::new_v4();
    let q1 = make_question(subcategory_id, "Bed linen");
    let q2 = make_question(subcategory_id, "Minibar stock");
    let q3 = make_question(subcategory_id, "Lobby lighting");
    let tree = tree_with_questions(SurveyKind::Internal, vec![q1.clone(), q2.clone(), q3.clone()]);
    let submission = make_submission(tree.template.id, Uuid::new_v4());

    let store = Arc::new(InMemoryStore::default());
    let policy = EscalationPolicy::new(store.clone(), None);

    let responses = vec![
        make_response(submission.id, q1.id, 2, Some("Stained sheets")),
        make_response(submission.id, q2.id, 5, Some("Empty since Monday")),
        // High score, not escalated
        make_response(submission.id, q3.id, 9, Some("noted anyway")),
    ];

    let tasks = policy
        .evaluate(&submission, SurveyKind::Internal, &tree, &responses)
        .await
        .unwrap();

    assert_eq!(tasks.len(), 2);
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert!(titles.contains(&"Bed linen"));
    assert!(titles.contains(&"Minibar stock"));
}

#[tokio::test]
async fn prior_task_for_same_property_and_question_flags_repeat() {
    let subcategory_id = Uuid::new_v4();
    let question = make_question(subcategory_id, "Pool water quality");
    let tree = tree_with_questions(SurveyKind::Internal, vec![question.clone()]);
    let property_id = Uuid::new_v4();
    let submission = make_submission(tree.template.id, property_id);

    let store = Arc::new(InMemoryStore::with_prior(property_id, question.id));
    let policy = EscalationPolicy::new(store.clone(), Some(90));

    let responses = vec![make_response(
        submission.id,
        question.id,
        3,
        Some("Cloudy again"),
    )];

    let tasks = policy
        .evaluate(&submission, SurveyKind::Internal, &tree, &responses)
        .await
        .unwrap();

    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].is_repeat_issue);
}

#[tokio::test]
async fn same_issue_at_another_property_is_not_a_repeat() {
    let subcategory_id = Uuid::new_v4();
    let question = make_question(subcategory_id, "Pool water quality");
    let tree = tree_with_questions(SurveyKind::Internal, vec![question.clone()]);
    let other_property = Uuid::new_v4();
    let submission = make_submission(tree.template.id, Uuid::new_v4());

    let store = Arc::new(InMemoryStore::with_prior(other_property, question.id));
    let policy = EscalationPolicy::new(store.clone(), None);

    let responses = vec![make_response(
        submission.id,
        question.id,
        3,
        Some("Cloudy water"),
    )];

    let tasks = policy
        .evaluate(&submission, SurveyKind::Internal, &tree, &responses)
        .await
        .unwrap();

    assert_eq!(tasks.len(), 1);
    assert!(!tasks[0].is_repeat_issue);
}

#[tokio::test]
async fn store_failure_surfaces_as_error_for_the_caller_to_log() {
    let subcategory_id = Uuid::new_v4();
    let question = make_question(subcategory_id, "Fire exits clear");
    let tree = tree_with_questions(SurveyKind::Internal, vec![question.clone()]);
    let submission = make_submission(tree.template.id, Uuid::new_v4());

    let store = Arc::new(InMemoryStore {
        fail_inserts: true,
        ..Default::default()
    });
    let policy = EscalationPolicy::new(store, None);

    let responses = vec![make_response(
        submission.id,
        question.id,
        1,
        Some("Boxes stacked in the stairwell"),
    )];

    // The finalization boundary logs this and keeps the submission finalized;
    // the policy itself reports the failure honestly
    let result = policy
        .evaluate(&submission, SurveyKind::Internal, &tree, &responses)
        .await;

    assert!(result.is_err());
}
