use crate::handlers::v1::notifications;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{delete, get, put};
use axum::{middleware, Router};

pub fn notifications_routes() -> Router<AppState> {
    // Protected routes that require authentication
    Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/{notification_id}/read", put(notifications::mark_notification_read))
        .route("/{notification_id}", delete(notifications::delete_notification))
        .layer(middleware::from_fn(auth_middleware))
}
