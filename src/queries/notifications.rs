use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{db_error, AppError, AppResult},
    models::notifications::{Notification, NotificationType},
};

pub async fn insert_notification(
    conn: &mut PgConnection,
    user_id: Uuid,
    notification_type: NotificationType,
    message: &str,
    sender_id: Uuid,
    chatroom_id: Option<Uuid>,
) -> AppResult<Notification> {
    let notification = sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (user_id, notification_type, message, sender_id, chatroom_id)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(notification_type)
    .bind(message)
    .bind(sender_id)
    .bind(chatroom_id)
    .fetch_one(conn)
    .await
    .map_err(|e| db_error("notification insert", e))?;

    Ok(notification)
}

pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    limit: i64,
) -> AppResult<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications
         WHERE user_id = $1
         ORDER BY is_read ASC, created_at DESC
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("notification list", e))?;

    Ok(notifications)
}

/// Recipient-scoped so one user can never flip another user's flags.
pub async fn mark_read(conn: &mut PgConnection, id: i64, user_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(conn)
        .await
        .map_err(|e| db_error("notification mark read", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!("Notification not found")));
    }
    Ok(())
}

pub async fn delete(conn: &mut PgConnection, id: i64, user_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(conn)
        .await
        .map_err(|e| db_error("notification delete", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!("Notification not found")));
    }
    Ok(())
}
