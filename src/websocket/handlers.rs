use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use sqlx::Acquire;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{
        messages::{ChatMessage, MessageKind},
        notifications::NotificationType,
        sessions::UserSession,
        websocket::{ClientFrame, WebSocketMessage},
    },
    queries::{
        chatrooms::{active_room_ids_for_user, get_room, touch_last_message, update_last_read},
        messages::{find_by_idempotency_key, insert_message},
        notifications::insert_notification,
    },
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "User session not found"
            )));
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, state, user_id)))
}

async fn handle_websocket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<WebSocketMessage>();

    // Outgoing pump: everything the dispatcher addresses to this user.
    let outgoing_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    state.websocket_manager.register(user_id, tx);

    // Subscribe the connection to every room the user can currently see.
    match state.db_pool.acquire().await {
        Ok(mut conn) => match active_room_ids_for_user(&mut conn, user_id).await {
            Ok(room_ids) => {
                for room_id in room_ids {
                    state.websocket_manager.subscribe(room_id, user_id);
                }
            }
            Err(e) => {
                tracing::error!(%user_id, error = %e, "failed to load rooms for connection");
                state.websocket_manager.unregister(user_id);
                outgoing_task.abort();
                return;
            }
        },
        Err(e) => {
            tracing::error!(%user_id, error = %e, "failed to acquire connection for websocket");
            state.websocket_manager.unregister(user_id);
            outgoing_task.abort();
            return;
        }
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_text_frame(&state, user_id, text.to_string()).await {
                    // Handler failures go to the sender's private channel,
                    // never to the room.
                    tracing::warn!(%user_id, error = %e, "websocket frame failed");
                    state.websocket_manager.send_to_user(
                        user_id,
                        WebSocketMessage::Error {
                            code: e.ws_code().to_string(),
                            message: e.to_string(),
                            detail: None,
                        },
                    );
                }
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                tracing::debug!(%user_id, error = %e, "websocket receive error");
                break;
            }
            _ => {}
        }
    }

    // cleanup when the connection closes
    state.presence.clear_user(user_id);
    state.websocket_manager.unregister(user_id);
    tracing::debug!(%user_id, "websocket handler finished");
}

async fn handle_text_frame(state: &AppState, user_id: Uuid, text: String) -> AppResult<()> {
    let frame: ClientFrame = serde_json::from_str(&text)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid frame format")))?;

    match frame {
        ClientFrame::SendMessage {
            chatroom_id,
            content,
            client_message_id,
        } => handle_send_message(state, user_id, chatroom_id, content, client_message_id).await,
        ClientFrame::EnterRoom { chatroom_id } => {
            handle_enter_room(state, user_id, chatroom_id).await
        }
        ClientFrame::LeaveRoom { chatroom_id } => {
            state.presence.leave(chatroom_id, user_id);
            Ok(())
        }
        ClientFrame::MarkRead {
            chatroom_id,
            message_id,
        } => handle_mark_read(state, user_id, chatroom_id, message_id).await,
        ClientFrame::Ping => {
            state
                .websocket_manager
                .send_to_user(user_id, WebSocketMessage::Pong);
            Ok(())
        }
    }
}

/// The send pipeline: writability check, idempotency check, durable insert
/// with the uniqueness constraint as the race arbiter, room summary update,
/// then broadcast + ack + presence-gated notification.
async fn handle_send_message(
    state: &AppState,
    user_id: Uuid,
    chatroom_id: Uuid,
    content: String,
    client_message_id: String,
) -> AppResult<()> {
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Message content cannot be empty"
        )));
    }
    if client_message_id.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "client_message_id cannot be empty"
        )));
    }

    let mut conn = state
        .db_pool
        .acquire()
        .await
        .map_err(|e| crate::error::db_error("send acquire", e))?;

    let room = get_room(&mut conn, chatroom_id).await?;
    if !room.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not a participant of this chatroom"
        )));
    }
    if !room.is_writable_by(user_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Chatroom is not writable"
        )));
    }

    // Retried send: return the original, push nothing, notify nobody.
    if let Some(existing) =
        find_by_idempotency_key(&mut conn, chatroom_id, user_id, &client_message_id).await?
    {
        ack(state, user_id, &existing);
        return Ok(());
    }

    // Insert and summary update land together.
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| crate::error::db_error("send transaction", e))?;

    let inserted = insert_message(&mut tx, chatroom_id, user_id, &client_message_id, &content)
        .await
        .map_err(|e| {
            tracing::error!(%chatroom_id, sender = %user_id, key = %client_message_id, error = %e,
                "message insert failed");
            e
        })?;

    let message = match inserted {
        Some(message) => message,
        None => {
            // Lost the race against a concurrent retry of the same key. The
            // constraint arbitrated; re-read and treat the winner as ours.
            drop(tx);
            let existing =
                find_by_idempotency_key(&mut conn, chatroom_id, user_id, &client_message_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalServerError(anyhow::anyhow!(
                            "Message vanished after idempotency conflict"
                        ))
                    })?;
            ack(state, user_id, &existing);
            return Ok(());
        }
    };

    touch_last_message(&mut tx, chatroom_id, message.id, message.created_at).await?;
    tx.commit()
        .await
        .map_err(|e| crate::error::db_error("send commit", e))?;

    // Push to subscribers and ack the sender. The two are not ordered with
    // respect to each other; both follow the durable insert.
    state.websocket_manager.broadcast_to_room(
        chatroom_id,
        WebSocketMessage::Message {
            message_id: message.id,
            chatroom_id,
            sender_id: user_id,
            message_type: MessageKind::Text,
            content: message.content.clone(),
            created_at: message.created_at,
        },
        None,
    );
    ack(state, user_id, &message);

    // Partner not looking at this room right now -> durable notification.
    if let Some(partner_id) = room.other_participant(user_id) {
        if !state.presence.is_present(chatroom_id, partner_id) {
            notify_absent_partner(state, &mut conn, user_id, partner_id, chatroom_id).await;
        }
    }

    Ok(())
}

fn ack(state: &AppState, user_id: Uuid, message: &ChatMessage) {
    state.websocket_manager.send_to_user(
        user_id,
        WebSocketMessage::Ack {
            client_message_id: message.client_message_id.clone(),
            message_id: message.id,
            status: "OK".to_string(),
            created_at: message.created_at,
        },
    );
}

/// Best effort beyond the durable row: the insert must succeed, the
/// realtime push may not find the partner connected.
async fn notify_absent_partner(
    state: &AppState,
    conn: &mut sqlx::PgConnection,
    sender_id: Uuid,
    partner_id: Uuid,
    chatroom_id: Uuid,
) {
    let sender_name = match state.candidate_cache.get_profile(&state.db_pool, sender_id).await {
        Ok(Some(profile)) => profile.display_name,
        Ok(None) => "A roommate candidate".to_string(),
        Err(e) => {
            tracing::warn!(%sender_id, error = %e, "failed to resolve sender name");
            "A roommate candidate".to_string()
        }
    };

    let text = format!("New message from {}", sender_name);
    match insert_notification(
        conn,
        partner_id,
        NotificationType::Chat,
        &text,
        sender_id,
        Some(chatroom_id),
    )
    .await
    {
        Ok(notification) => {
            state.websocket_manager.send_to_user(
                partner_id,
                WebSocketMessage::Notification {
                    notification_id: notification.id,
                    notification_type: notification.notification_type,
                    sender_id,
                    chatroom_id: Some(chatroom_id),
                    message: notification.message,
                },
            );
        }
        Err(e) => {
            tracing::error!(%chatroom_id, sender = %sender_id, recipient = %partner_id, error = %e,
                "chat notification insert failed");
        }
    }
}

/// Opening a view also subscribes the connection, covering rooms created
/// after connect (a match confirmed mid-session).
async fn handle_enter_room(state: &AppState, user_id: Uuid, chatroom_id: Uuid) -> AppResult<()> {
    let mut conn = state
        .db_pool
        .acquire()
        .await
        .map_err(|e| crate::error::db_error("enter room acquire", e))?;

    let room = get_room(&mut conn, chatroom_id).await?;
    if !room.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not a participant of this chatroom"
        )));
    }

    state.websocket_manager.subscribe(chatroom_id, user_id);
    state.presence.enter(chatroom_id, user_id);
    Ok(())
}

async fn handle_mark_read(
    state: &AppState,
    user_id: Uuid,
    chatroom_id: Uuid,
    message_id: i64,
) -> AppResult<()> {
    let mut conn = state
        .db_pool
        .acquire()
        .await
        .map_err(|e| crate::error::db_error("mark read acquire", e))?;

    let room = get_room(&mut conn, chatroom_id).await?;
    if !room.is_participant(user_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not a participant of this chatroom"
        )));
    }

    update_last_read(&mut conn, chatroom_id, user_id, message_id).await
}
