use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Text,
}

/// Append-only chat message. `id` is the server-assigned surrogate that
/// totally orders messages within a room; `(chatroom_id, sender_id,
/// client_message_id)` is the idempotency key for retried sends.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub chatroom_id: Uuid,
    pub sender_id: Uuid,
    pub client_message_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
