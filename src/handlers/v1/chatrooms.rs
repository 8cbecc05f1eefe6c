use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{chatrooms::RoomStatus, sessions::UserSession},
    queries::{
        chatrooms::{
            block_room, close_side, get_room, list_rooms_for_user, reactivate_room,
            update_last_read,
        },
        messages::history,
    },
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

async fn session_user(session: &Session) -> AppResult<Uuid> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    match user_session {
        Some(user_data) => Ok(user_data.user_id),
        None => Err(AppError::Unauthorized(anyhow!("User session not found"))),
    }
}

fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[derive(serde::Deserialize)]
pub struct ListRoomsQuery {
    pub status: Option<RoomStatus>,
    // Keyset cursor: the sort key of the last row from the previous page.
    pub cursor: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListRoomsQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user(&session).await?;

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let rooms = list_rooms_for_user(
        &mut conn,
        user_id,
        query.status.unwrap_or(RoomStatus::Active),
        query.cursor,
        page_limit(query.limit),
    )
    .await?;

    Ok(Json(rooms))
}

#[derive(serde::Deserialize)]
pub struct HistoryQuery {
    // Strictly-below message id from the previous page.
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn room_history(
    State(state): State<AppState>,
    session: Session,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user(&session).await?;

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let room = get_room(&mut conn, room_id).await?;
    if !room.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow!(
            "You are not a participant of this chatroom"
        )));
    }

    let messages = history(&mut conn, room_id, query.cursor, page_limit(query.limit)).await?;

    Ok(Json(messages))
}

pub async fn leave_room(
    State(state): State<AppState>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user(&session).await?;

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let room = get_room(&mut conn, room_id).await?;
    if !room.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow!(
            "You are not a participant of this chatroom"
        )));
    }

    close_side(&mut conn, room_id, user_id).await?;

    // The room is gone from this user's view; stop streaming it too.
    state.websocket_manager.unsubscribe(room_id, user_id);
    state.presence.leave(room_id, user_id);

    Ok((axum::http::StatusCode::OK, "Left chatroom"))
}

pub async fn block(
    State(state): State<AppState>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user(&session).await?;

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let room = get_room(&mut conn, room_id).await?;
    if !room.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow!(
            "You are not a participant of this chatroom"
        )));
    }
    if let Some(blocked_by) = room.blocked_by {
        if blocked_by == user_id {
            // Blocking twice is a no-op.
            return Ok((axum::http::StatusCode::OK, "Chatroom blocked"));
        }
        return Err(AppError::Conflict(anyhow!(
            "Chatroom is already blocked by the other participant"
        )));
    }

    block_room(&mut conn, room_id, user_id).await?;

    Ok((axum::http::StatusCode::OK, "Chatroom blocked"))
}

/// Only the blocker can lift their own block. Both sides reopen.
pub async fn reactivate(
    State(state): State<AppState>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user(&session).await?;

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let room = get_room(&mut conn, room_id).await?;
    match room.blocked_by {
        None => {
            return Err(AppError::Conflict(anyhow!("Chatroom is not blocked")));
        }
        Some(blocked_by) if blocked_by != user_id => {
            return Err(AppError::Forbidden(anyhow!(
                "Only the blocking user can reactivate this chatroom"
            )));
        }
        Some(_) => {}
    }

    reactivate_room(&mut conn, room_id).await?;

    Ok((axum::http::StatusCode::OK, "Chatroom reactivated"))
}

#[derive(serde::Deserialize)]
pub struct LastReadPayload {
    pub message_id: i64,
}

pub async fn set_last_read(
    State(state): State<AppState>,
    session: Session,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<LastReadPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = session_user(&session).await?;

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let room = get_room(&mut conn, room_id).await?;
    if !room.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow!(
            "You are not a participant of this chatroom"
        )));
    }

    update_last_read(&mut conn, room_id, user_id, payload.message_id).await?;

    Ok((axum::http::StatusCode::OK, "Read cursor updated"))
}
