use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Chat,
    MatchAccepted,
    MatchRejected,
}

/// Durable alert for an offline or inactive user. Created by the match
/// ledger and the chat dispatcher; only the recipient mutates it afterwards
/// (read flag) or deletes it.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub message: String,
    pub sender_id: Uuid,
    pub chatroom_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
