use crate::handlers::v1::candidates;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{get, put};
use axum::{middleware, Router};

pub fn candidates_routes() -> Router<AppState> {
    // Protected routes that require authentication
    Router::new()
        .route("/", get(candidates::list_candidates))
        .route("/preferences", put(candidates::set_preferences))
        .layer(middleware::from_fn(auth_middleware))
}
