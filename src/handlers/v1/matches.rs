use anyhow::anyhow;
use axum::{extract::State, response::IntoResponse, Json};
use sqlx::Acquire;
use tower_sessions::Session;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{
        candidates::preference_score,
        matches::{derive_status, MatchRecord, MatchResponse, MatchType},
        notifications::NotificationType,
        sessions::UserSession,
        websocket::WebSocketMessage,
    },
    queries::{
        chatrooms::insert_room_if_absent,
        matches::{
            delete_unconfirmed_for_user, find_pair_records, get_match_for_update, insert_match,
            list_for_user, update_responses, upgrade_to_request,
        },
        notifications::insert_notification,
    },
};

#[derive(serde::Deserialize, Validate)]
pub struct LikePayload {
    #[validate(length(min = 1, message = "Receiver ID cannot be empty"))]
    pub receiver_id: String,
}

/// A like or a formal roommate request both start here; they differ only in
/// the record type.
async fn create_relationship(
    state: AppState,
    session: Session,
    payload: LikePayload,
    match_type: MatchType,
) -> AppResult<Json<MatchRecord>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(anyhow!("Invalid request data: {}", e)))?;

    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow!("User session not found")));
        }
    };

    let receiver_id = Uuid::parse_str(payload.receiver_id.trim())
        .map_err(|_| AppError::BadRequest(anyhow!("Invalid receiver ID format")))?;

    if receiver_id == user_id {
        return Err(AppError::BadRequest(anyhow!("Cannot match with yourself")));
    }

    // Both profiles are needed for the compatibility score; an unknown
    // receiver is a 404, not a silent zero-score record.
    let sender_profile = state
        .candidate_cache
        .get_profile(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow!("Sender profile not found")))?;
    let receiver_profile = state
        .candidate_cache
        .get_profile(&state.db_pool, receiver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow!("Receiver profile not found")))?;

    let score = preference_score(&sender_profile, &receiver_profile);

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let existing = find_pair_records(&mut conn, user_id, receiver_id).await?;

    // An opposite-direction record that is pending or accepted blocks a new
    // one; the other user moved first.
    if existing.iter().any(|r| {
        r.sender_id == receiver_id && r.match_status != MatchResponse::Rejected
    }) {
        return Err(AppError::Conflict(anyhow!(
            "An active relationship from this user already exists"
        )));
    }

    // A same-direction like can be upgraded in place to a formal request;
    // only the type changes, the response slots are untouched.
    if let Some(own) = existing.iter().find(|r| r.sender_id == user_id) {
        if match_type == MatchType::Request
            && own.match_type == MatchType::Like
            && own.match_status != MatchResponse::Rejected
        {
            let upgraded = upgrade_to_request(&mut conn, own.id).await?;
            return Ok(Json(upgraded));
        }
        return Err(AppError::Conflict(anyhow!("Relationship already exists")));
    }

    // The unique constraint on (sender_id, receiver_id) arbitrates a race
    // between two identical submissions; the loser gets Conflict.
    let record = insert_match(&mut conn, user_id, receiver_id, match_type, score).await?;

    Ok(Json(record))
}

pub async fn like(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LikePayload>,
) -> AppResult<impl IntoResponse> {
    create_relationship(state, session, payload, MatchType::Like).await
}

pub async fn request(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LikePayload>,
) -> AppResult<impl IntoResponse> {
    create_relationship(state, session, payload, MatchType::Request).await
}

#[derive(serde::Deserialize)]
pub struct RespondPayload {
    pub match_id: i32,
    pub response: MatchResponse,
}

#[derive(serde::Serialize)]
pub struct RespondResponse {
    #[serde(flatten)]
    pub record: MatchRecord,
    pub chatroom_id: Option<Uuid>,
}

pub async fn respond(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<RespondPayload>,
) -> AppResult<impl IntoResponse> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow!("User session not found")));
        }
    };

    if payload.response == MatchResponse::Pending {
        return Err(AppError::BadRequest(anyhow!(
            "Response must be ACCEPTED or REJECTED"
        )));
    }

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(anyhow!("Database transaction failed: {}", e)))?;

    let record = get_match_for_update(&mut tx, payload.match_id).await?;

    if !record.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow!(
            "You are not a participant of this match"
        )));
    }

    // Write the caller's own slot only.
    let (sender_response, receiver_response) = if record.sender_id == user_id {
        (payload.response, record.receiver_response)
    } else {
        (record.sender_response, payload.response)
    };

    // Re-applying the response a record already holds is a no-op; changing a
    // resolved match is a conflict.
    if (sender_response, receiver_response) == (record.sender_response, record.receiver_response) {
        tx.commit().await.map_err(|e| {
            AppError::InternalServerError(anyhow!("Failed to commit transaction: {}", e))
        })?;
        return Ok(Json(RespondResponse {
            record,
            chatroom_id: None,
        }));
    }
    if record.is_terminal() {
        return Err(AppError::Conflict(anyhow!("Match is already resolved")));
    }

    // Convergence rule, applied in the same transaction as the slot write.
    let new_status = derive_status(sender_response, receiver_response);
    let updated = update_responses(
        &mut tx,
        record.id,
        sender_response,
        receiver_response,
        new_status,
    )
    .await?;

    let other_id = record.other_participant(user_id);
    let mut chatroom_id = None;
    let mut pushes: Vec<(Uuid, WebSocketMessage)> = Vec::new();

    if new_status == MatchResponse::Accepted {
        // Mutual acceptance opens the room, idempotently.
        let room = insert_room_if_absent(&mut tx, record.sender_id, record.receiver_id).await?;
        chatroom_id = Some(room.id);

        for (recipient, counterpart) in [(user_id, other_id), (other_id, user_id)] {
            let name = display_name(&state, counterpart).await;
            let text = format!("You matched with {}", name);
            let notification = insert_notification(
                &mut tx,
                recipient,
                NotificationType::MatchAccepted,
                &text,
                counterpart,
                Some(room.id),
            )
            .await?;
            pushes.push((
                recipient,
                WebSocketMessage::Notification {
                    notification_id: notification.id,
                    notification_type: notification.notification_type,
                    sender_id: counterpart,
                    chatroom_id: Some(room.id),
                    message: notification.message,
                },
            ));
        }
    } else if new_status == MatchResponse::Rejected {
        // Only the side that did not just respond learns about it.
        let name = display_name(&state, user_id).await;
        let text = format!("{} declined the match", name);
        let notification = insert_notification(
            &mut tx,
            other_id,
            NotificationType::MatchRejected,
            &text,
            user_id,
            None,
        )
        .await?;
        pushes.push((
            other_id,
            WebSocketMessage::Notification {
                notification_id: notification.id,
                notification_type: notification.notification_type,
                sender_id: user_id,
                chatroom_id: None,
                message: notification.message,
            },
        ));
    }

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(anyhow!("Failed to commit transaction: {}", e)))?;

    // Realtime side of the notifications, after the durable writes landed.
    for (recipient, push) in pushes {
        state.websocket_manager.send_to_user(recipient, push);
    }
    if let Some(room_id) = chatroom_id {
        // Subscribe live connections so the new room streams immediately.
        for participant in [record.sender_id, record.receiver_id] {
            if state.websocket_manager.is_connected(participant) {
                state.websocket_manager.subscribe(room_id, participant);
            }
        }
    }

    Ok(Json(RespondResponse {
        record: updated,
        chatroom_id,
    }))
}

/// Withdrawing from matching: drops every pending record and plain like but
/// keeps confirmed roommate matches.
pub async fn cancel_unconfirmed(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow!("User session not found")));
        }
    };

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let deleted = delete_unconfirmed_for_user(&mut conn, user_id).await?;

    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

pub async fn list_matches(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow!("User session not found")));
        }
    };

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let records = list_for_user(&mut conn, user_id).await?;

    Ok(Json(records))
}

async fn display_name(state: &AppState, user_id: Uuid) -> String {
    match state.candidate_cache.get_profile(&state.db_pool, user_id).await {
        Ok(Some(profile)) => profile.display_name,
        _ => "A roommate candidate".to_string(),
    }
}
