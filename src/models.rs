pub mod candidates;
pub mod chatrooms;
pub mod matches;
pub mod messages;
pub mod notifications;
pub mod sessions;
pub mod websocket;
