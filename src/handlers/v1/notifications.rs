use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use tower_sessions::Session;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::sessions::UserSession,
    queries::notifications::{delete, list_for_user, mark_read},
};

#[derive(serde::Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
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

    let notifications =
        list_for_user(&mut conn, user_id, query.limit.unwrap_or(100).clamp(1, 500)).await?;

    Ok(Json(notifications))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    session: Session,
    Path(notification_id): Path<i64>,
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

    mark_read(&mut conn, notification_id, user_id).await?;

    Ok((axum::http::StatusCode::OK, "Notification marked as read"))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    session: Session,
    Path(notification_id): Path<i64>,
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

    delete(&mut conn, notification_id, user_id).await?;

    Ok((axum::http::StatusCode::OK, "Notification deleted"))
}
