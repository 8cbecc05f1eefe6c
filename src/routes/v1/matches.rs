use crate::handlers::v1::matches;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{delete, get, post};
use axum::{middleware, Router};

pub fn matches_routes() -> Router<AppState> {
    // Protected routes that require authentication
    Router::new()
        .route("/", get(matches::list_matches))
        .route("/like", post(matches::like))
        .route("/request", post(matches::request))
        .route("/respond", post(matches::respond))
        .route("/unconfirmed", delete(matches::cancel_unconfirmed))
        .layer(middleware::from_fn(auth_middleware))
}
