mod app_state;
mod cache;
mod db;
mod error;
mod handlers;
mod middlewares;
mod models;
mod queries;
mod routes;
mod websocket;

use std::sync::Arc;
use std::time::Duration;

use cache::candidates::{CandidateCache, SystemClock};
use tower_sessions::SessionManagerLayer;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::EnvFilter;
use websocket::{manager::WebSocketManager, presence::PresenceTracker};

// Bounds cache staleness even when an invalidation call is lost to a crash.
const CACHE_REFRESH_PERIOD: Duration = Duration::from_secs(300);
const PROFILE_TTL: Duration = Duration::from_secs(600);
const CANDIDATE_LIST_TTL: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let pool = match db::connect_to_db().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Error connecting to database");
            std::process::exit(1);
        }
    };

    let session_store = PostgresStore::new(pool.clone());
    if let Err(e) = session_store.migrate().await {
        tracing::error!(error = %e, "Error preparing session store");
        std::process::exit(1);
    }
    let session_layer = SessionManagerLayer::new(session_store);

    let candidate_cache = CandidateCache::new(PROFILE_TTL, CANDIDATE_LIST_TTL, Arc::new(SystemClock));
    let _refresher =
        cache::refresh::spawn_refresher(pool.clone(), candidate_cache.clone(), CACHE_REFRESH_PERIOD);

    let state = app_state::AppState {
        db_pool: pool,
        websocket_manager: WebSocketManager::new(),
        presence: PresenceTracker::new(),
        candidate_cache,
    };
    let app = routes::create_routes().with_state(state).layer(session_layer);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%bind_addr, error = %e, "Error binding listener");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind_addr, "server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
