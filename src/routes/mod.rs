pub mod dashboard;
pub mod guest;
pub mod health;
pub mod me;
pub mod notifications;
pub mod properties;
pub mod sop;
pub mod submissions;
pub mod tasks;
pub mod templates;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route(
            "/guest/:link_id/submissions",
            post(guest::create_guest_submission),
        )
        // Protected routes
        .route("/me", get(me::get_me))
        // Properties
        .route("/properties", post(properties::create_property))
        .route("/properties", get(properties::list_properties))
        .route("/properties/:property_id", get(properties::get_property))
        .route("/properties/:property_id", put(properties::update_property))
        // Templates (admin-managed survey definitions)
        .route("/templates", post(templates::create_template))
        .route("/templates", get(templates::list_templates))
        .route("/templates/:template_id", get(templates::get_template))
        .route("/templates/:template_id", put(templates::update_template))
        .route("/templates/:template_id", delete(templates::delete_template))
        .route(
            "/templates/:template_id/categories",
            post(templates::create_category),
        )
        .route("/categories/:category_id", put(templates::update_category))
        .route(
            "/categories/:category_id",
            delete(templates::delete_category),
        )
        .route(
            "/categories/:category_id/subcategories",
            post(templates::create_subcategory),
        )
        .route(
            "/subcategories/:subcategory_id",
            delete(templates::delete_subcategory),
        )
        .route(
            "/subcategories/:subcategory_id/questions",
            post(templates::create_question),
        )
        .route("/questions/:question_id", put(templates::update_question))
        .route(
            "/questions/:question_id",
            delete(templates::delete_question),
        )
        // Submissions (nested under properties)
        .route(
            "/properties/:property_id/submissions",
            post(submissions::create_submission),
        )
        .route(
            "/properties/:property_id/submissions",
            get(submissions::list_submissions),
        )
        .route(
            "/submissions/:submission_id/responses",
            put(submissions::save_responses),
        )
        .route(
            "/submissions/:submission_id/finalize",
            post(submissions::finalize_submission),
        )
        .route(
            "/submissions/:submission_id",
            get(submissions::get_submission),
        )
        // Tasks
        .route("/properties/:property_id/tasks", get(tasks::list_tasks))
        .route("/tasks/:task_id", get(tasks::get_task))
        .route("/tasks/:task_id/status", patch(tasks::transition_task))
        .route("/tasks/:task_id/assign", patch(tasks::assign_task))
        // Dashboard
        .route("/dashboard/overview", get(dashboard::overview))
        .route(
            "/dashboard/properties/:property_id/trend",
            get(dashboard::property_trend),
        )
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/:notification_id/read",
            post(notifications::mark_read),
        )
        // SOP checklists
        .route(
            "/properties/:property_id/sop-checklists",
            get(sop::list_checklists),
        )
        .route(
            "/properties/:property_id/sop-checklists",
            post(sop::create_checklist),
        )
        .route(
            "/sop-checklists/:checklist_id/status",
            get(sop::checklist_status),
        )
        .route("/sop-items/:item_id/complete", post(sop::complete_item))
}
