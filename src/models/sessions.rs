use serde::{Deserialize, Serialize};

/// Authenticated principal resolved by the identity layer for every request
/// and websocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: uuid::Uuid,
    pub email: String,
}
