//! Notification service
//!
//! Provides functions to create notification rows from other parts of the
//! application. Called by the finalization and task routes when events occur
//! that should surface in a user's notification feed.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::notifications::NotificationType;
use crate::domain::tasks::Task;

/// Create a notification for a user
pub async fn create_notification(
    db: &PgPool,
    user_id: Uuid,
    notification_type: NotificationType,
    title: &str,
    message: Option<&str>,
    data: Option<serde_json::Value>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let type_str = notification_type.to_string();
    let data = data.unwrap_or(serde_json::json!({}));

    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, type, title, message, data, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&type_str)
    .bind(title)
    .bind(message)
    .bind(&data)
    .execute(db)
    .await?;

    tracing::info!(
        user_id = %user_id,
        notification_type = %type_str,
        notification_id = %id,
        "Notification created"
    );

    Ok(id)
}

/// Notify every property manager assigned to the task's property that a new
/// remediation task was created. Repeat issues get their own type so clients
/// can highlight them.
pub async fn notify_task_created(
    db: &PgPool,
    task: &Task,
    property_name: &str,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let manager_ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT pm.user_id
        FROM property_members pm
        JOIN users u ON u.id = pm.user_id
        WHERE pm.property_id = $1 AND u.role = 'property_manager'
        "#,
    )
    .bind(task.property_id)
    .fetch_all(db)
    .await?;

    let notification_type = if task.is_repeat_issue {
        NotificationType::RepeatIssue
    } else {
        NotificationType::TaskCreated
    };

    let title = if task.is_repeat_issue {
        format!("Repeat issue at {}", property_name)
    } else {
        format!("New task at {}", property_name)
    };

    let mut ids = Vec::with_capacity(manager_ids.len());
    for user_id in manager_ids {
        let id = create_notification(
            db,
            user_id,
            notification_type,
            &title,
            Some(&task.title),
            Some(serde_json::json!({
                "task_id": task.id,
                "property_id": task.property_id,
                "is_repeat_issue": task.is_repeat_issue,
            })),
        )
        .await?;
        ids.push(id);
    }

    Ok(ids)
}

/// Notify a user that a task was assigned to them.
pub async fn notify_task_assigned(
    db: &PgPool,
    assignee_id: Uuid,
    task: &Task,
    property_name: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        assignee_id,
        NotificationType::TaskAssigned,
        &format!("Task assigned to you at {}", property_name),
        Some(&task.title),
        Some(serde_json::json!({
            "task_id": task.id,
            "property_id": task.property_id,
        })),
    )
    .await
}
