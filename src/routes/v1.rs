pub mod candidates;
pub mod chatrooms;
pub mod matches;
pub mod notifications;
pub mod websocket;

use crate::app_state::AppState;
use axum::Router;

pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/matches", matches::matches_routes())
        .nest("/chatrooms", chatrooms::chatrooms_routes())
        .nest("/notifications", notifications::notifications_routes())
        .nest("/candidates", candidates::candidates_routes())
        .merge(websocket::websocket_routes())
}
