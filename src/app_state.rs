use crate::cache::candidates::CandidateCache;
use crate::websocket::manager::WebSocketManager;
use crate::websocket::presence::PresenceTracker;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub websocket_manager: WebSocketManager,
    pub presence: PresenceTracker,
    pub candidate_cache: CandidateCache,
}
