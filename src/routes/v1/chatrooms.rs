use crate::handlers::v1::chatrooms;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{get, post, put};
use axum::{middleware, Router};

pub fn chatrooms_routes() -> Router<AppState> {
    // Protected routes that require authentication
    Router::new()
        .route("/", get(chatrooms::list_rooms))
        .route("/{room_id}/messages", get(chatrooms::room_history))
        .route("/{room_id}/leave", post(chatrooms::leave_room))
        .route("/{room_id}/block", post(chatrooms::block))
        .route("/{room_id}/reactivate", post(chatrooms::reactivate))
        .route("/{room_id}/read", put(chatrooms::set_last_read))
        .layer(middleware::from_fn(auth_middleware))
}
