use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{db_error, AppError, AppResult},
    models::chatrooms::{canonical_pair, Chatroom, RoomListEntry, RoomStatus},
};

/// Idempotent room creation for an unordered pair. The unique constraint on
/// (smaller_user_id, larger_user_id) is the sole arbiter under concurrent
/// invocation: a conflicting insert falls through to the re-select.
pub async fn insert_room_if_absent(
    conn: &mut PgConnection,
    user_a: Uuid,
    user_b: Uuid,
) -> AppResult<Chatroom> {
    let (smaller, larger) = canonical_pair(user_a, user_b);

    sqlx::query(
        "INSERT INTO chatrooms (id, smaller_user_id, larger_user_id)
         VALUES ($1, $2, $3)
         ON CONFLICT (smaller_user_id, larger_user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(smaller)
    .bind(larger)
    .execute(&mut *conn)
    .await
    .map_err(|e| db_error("chatroom insert", e))?;

    let room = sqlx::query_as::<_, Chatroom>(
        "SELECT * FROM chatrooms WHERE smaller_user_id = $1 AND larger_user_id = $2",
    )
    .bind(smaller)
    .bind(larger)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db_error("chatroom lookup", e))?;

    Ok(room)
}

pub async fn get_room(conn: &mut PgConnection, room_id: Uuid) -> AppResult<Chatroom> {
    let room = sqlx::query_as::<_, Chatroom>("SELECT * FROM chatrooms WHERE id = $1")
        .bind(room_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_error("chatroom lookup", e))?;

    room.ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Chatroom not found")))
}

/// Closes the caller's own side only; the room stays usable by the other
/// participant.
pub async fn close_side(conn: &mut PgConnection, room_id: Uuid, user_id: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE chatrooms
         SET smaller_status = CASE WHEN smaller_user_id = $2 THEN 'closed'::room_status ELSE smaller_status END,
             larger_status  = CASE WHEN larger_user_id  = $2 THEN 'closed'::room_status ELSE larger_status END
         WHERE id = $1",
    )
    .bind(room_id)
    .bind(user_id)
    .execute(conn)
    .await
    .map_err(|e| db_error("chatroom leave", e))?;

    Ok(())
}

/// A block closes both sides and records who blocked.
pub async fn block_room(conn: &mut PgConnection, room_id: Uuid, by_user: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE chatrooms
         SET smaller_status = 'closed', larger_status = 'closed',
             blocked_by = $2, blocked_at = now()
         WHERE id = $1",
    )
    .bind(room_id)
    .bind(by_user)
    .execute(conn)
    .await
    .map_err(|e| db_error("chatroom block", e))?;

    Ok(())
}

/// Lifting a block reopens both sides and clears the marker.
pub async fn reactivate_room(conn: &mut PgConnection, room_id: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE chatrooms
         SET smaller_status = 'active', larger_status = 'active',
             blocked_by = NULL, blocked_at = NULL
         WHERE id = $1",
    )
    .bind(room_id)
    .execute(conn)
    .await
    .map_err(|e| db_error("chatroom reactivate", e))?;

    Ok(())
}

/// Rooms filtered by the caller's own side status (ACTIVE by default, CLOSED
/// for the archive view), newest activity first. Keyset cursor on
/// coalesce(last_message_at, created_at): the sort key changes on every new
/// message, so an offset cursor would skip or repeat rows under concurrent
/// sends.
pub async fn list_rooms_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    status: RoomStatus,
    cursor: Option<DateTime<Utc>>,
    limit: i64,
) -> AppResult<Vec<RoomListEntry>> {
    let rooms = sqlx::query_as::<_, RoomListEntry>(
        "SELECT c.*,
                (SELECT count(*) FROM messages m
                 WHERE m.chatroom_id = c.id
                   AND m.id > COALESCE(
                       CASE WHEN c.smaller_user_id = $1 THEN c.smaller_last_read_id
                            ELSE c.larger_last_read_id END, 0)) AS unread_count
         FROM chatrooms c
         WHERE ((c.smaller_user_id = $1 AND c.smaller_status = $2)
             OR (c.larger_user_id = $1 AND c.larger_status = $2))
           AND ($3::timestamptz IS NULL OR COALESCE(c.last_message_at, c.created_at) < $3)
         ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
         LIMIT $4",
    )
    .bind(user_id)
    .bind(status)
    .bind(cursor)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("chatroom list", e))?;

    Ok(rooms)
}

/// All room ids the user can currently see; used to subscribe a fresh
/// websocket connection.
pub async fn active_room_ids_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM chatrooms
         WHERE (smaller_user_id = $1 AND smaller_status = 'active')
            OR (larger_user_id = $1 AND larger_status = 'active')",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("chatroom ids", e))?;

    Ok(ids)
}

pub async fn update_last_read(
    conn: &mut PgConnection,
    room_id: Uuid,
    user_id: Uuid,
    message_id: i64,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE chatrooms
         SET smaller_last_read_id = CASE WHEN smaller_user_id = $2 THEN $3 ELSE smaller_last_read_id END,
             larger_last_read_id  = CASE WHEN larger_user_id  = $2 THEN $3 ELSE larger_last_read_id END
         WHERE id = $1",
    )
    .bind(room_id)
    .bind(user_id)
    .bind(message_id)
    .execute(conn)
    .await
    .map_err(|e| db_error("read cursor update", e))?;

    Ok(())
}

/// Refreshes the room's last-message summary after a durable insert.
pub async fn touch_last_message(
    conn: &mut PgConnection,
    room_id: Uuid,
    message_id: i64,
    message_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE chatrooms SET last_message_id = $2, last_message_at = $3 WHERE id = $1",
    )
    .bind(room_id)
    .bind(message_id)
    .bind(message_at)
    .execute(conn)
    .await
    .map_err(|e| db_error("room summary update", e))?;

    Ok(())
}
