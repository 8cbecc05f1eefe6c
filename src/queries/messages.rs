use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{db_error, AppResult},
    models::messages::ChatMessage,
};

/// Idempotency lookup for a retried client send.
pub async fn find_by_idempotency_key(
    conn: &mut PgConnection,
    chatroom_id: Uuid,
    sender_id: Uuid,
    client_message_id: &str,
) -> AppResult<Option<ChatMessage>> {
    let message = sqlx::query_as::<_, ChatMessage>(
        "SELECT * FROM messages
         WHERE chatroom_id = $1 AND sender_id = $2 AND client_message_id = $3",
    )
    .bind(chatroom_id)
    .bind(sender_id)
    .bind(client_message_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| db_error("message idempotency lookup", e))?;

    Ok(message)
}

/// Returns None when another writer already inserted the same idempotency
/// key; the caller re-reads and treats the existing row as the result. Never
/// check-then-insert without this constraint backing it.
pub async fn insert_message(
    conn: &mut PgConnection,
    chatroom_id: Uuid,
    sender_id: Uuid,
    client_message_id: &str,
    content: &str,
) -> AppResult<Option<ChatMessage>> {
    let message = sqlx::query_as::<_, ChatMessage>(
        "INSERT INTO messages (chatroom_id, sender_id, client_message_id, content)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (chatroom_id, sender_id, client_message_id) DO NOTHING
         RETURNING *",
    )
    .bind(chatroom_id)
    .bind(sender_id)
    .bind(client_message_id)
    .bind(content)
    .fetch_optional(conn)
    .await
    .map_err(|e| db_error("message insert", e))?;

    Ok(message)
}

/// Descending surrogate-id page, strictly below the cursor when one is
/// given. Pure function of its inputs; no server-side cursor state.
pub async fn history(
    conn: &mut PgConnection,
    chatroom_id: Uuid,
    cursor: Option<i64>,
    limit: i64,
) -> AppResult<Vec<ChatMessage>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        "SELECT * FROM messages
         WHERE chatroom_id = $1
           AND ($2::bigint IS NULL OR id < $2)
         ORDER BY id DESC
         LIMIT $3",
    )
    .bind(chatroom_id)
    .bind(cursor)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("message history", e))?;

    Ok(messages)
}
