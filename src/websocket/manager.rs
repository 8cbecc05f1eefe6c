use crate::models::websocket::WebSocketMessage;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Connection registry for the realtime dispatcher. One outbound channel per
/// connected user (acks, errors and notifications are private), plus
/// per-room subscriber sets for message broadcast.
#[derive(Clone)]
pub struct WebSocketManager {
    // user_id -> outbound channel
    user_channels: Arc<DashMap<Uuid, tokio::sync::mpsc::UnboundedSender<WebSocketMessage>>>,
    // chatroom_id -> set of subscribed user_ids
    room_subscribers: Arc<DashMap<Uuid, Arc<DashMap<Uuid, ()>>>>,
    // user_id -> set of chatroom_ids, for disconnect cleanup
    user_rooms: Arc<DashMap<Uuid, Arc<DashMap<Uuid, ()>>>>,
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self {
            user_channels: Arc::new(DashMap::new()),
            room_subscribers: Arc::new(DashMap::new()),
            user_rooms: Arc::new(DashMap::new()),
        }
    }

    /// Registers the user's private channel. A reconnect replaces the old
    /// channel, which drops the stale sender.
    pub fn register(
        &self,
        user_id: Uuid,
        sender: tokio::sync::mpsc::UnboundedSender<WebSocketMessage>,
    ) {
        self.user_channels.insert(user_id, sender);
        tracing::debug!(%user_id, "websocket registered");
    }

    pub fn subscribe(&self, chatroom_id: Uuid, user_id: Uuid) {
        let subscribers = self
            .room_subscribers
            .entry(chatroom_id)
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();
        subscribers.insert(user_id, ());

        let rooms = self
            .user_rooms
            .entry(user_id)
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();
        rooms.insert(chatroom_id, ());
    }

    pub fn unsubscribe(&self, chatroom_id: Uuid, user_id: Uuid) {
        if let Some(subscribers) = self.room_subscribers.get(&chatroom_id) {
            subscribers.remove(&user_id);
            if subscribers.is_empty() {
                drop(subscribers);
                self.room_subscribers.remove(&chatroom_id);
            }
        }
        if let Some(rooms) = self.user_rooms.get(&user_id) {
            rooms.remove(&chatroom_id);
        }
    }

    /// Drops the channel and every room subscription; called when the
    /// connection closes.
    pub fn unregister(&self, user_id: Uuid) {
        self.user_channels.remove(&user_id);
        if let Some((_, rooms)) = self.user_rooms.remove(&user_id) {
            for room in rooms.iter() {
                if let Some(subscribers) = self.room_subscribers.get(room.key()) {
                    subscribers.remove(&user_id);
                    if subscribers.is_empty() {
                        drop(subscribers);
                        self.room_subscribers.remove(room.key());
                    }
                }
            }
        }
        tracing::debug!(%user_id, "websocket unregistered");
    }

    /// Pushes to every subscriber of the room. A send failure means the
    /// receiving task is gone; the dead channel is pruned.
    pub fn broadcast_to_room(
        &self,
        chatroom_id: Uuid,
        message: WebSocketMessage,
        exclude_user: Option<Uuid>,
    ) {
        let Some(subscribers) = self.room_subscribers.get(&chatroom_id) else {
            return;
        };
        for entry in subscribers.iter() {
            let user_id = *entry.key();
            if Some(user_id) == exclude_user {
                continue;
            }
            if let Some(channel) = self.user_channels.get(&user_id) {
                if channel.send(message.clone()).is_err() {
                    drop(channel);
                    self.user_channels.remove(&user_id);
                    tracing::debug!(%user_id, "pruned dead websocket channel");
                }
            }
        }
    }

    /// Private delivery: acks, error envelopes, notification pushes.
    pub fn send_to_user(&self, user_id: Uuid, message: WebSocketMessage) -> bool {
        match self.user_channels.get(&user_id) {
            Some(channel) => match channel.send(message) {
                Ok(_) => true,
                Err(_) => {
                    drop(channel);
                    self.user_channels.remove(&user_id);
                    tracing::debug!(%user_id, "pruned dead websocket channel");
                    false
                }
            },
            None => false,
        }
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.user_channels.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn envelope() -> WebSocketMessage {
        WebSocketMessage::Pong
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers_and_skips_excluded() {
        let manager = WebSocketManager::new();
        let room = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        manager.register(alice, tx_a);
        manager.register(bob, tx_b);
        manager.subscribe(room, alice);
        manager.subscribe(room, bob);

        manager.broadcast_to_room(room, envelope(), Some(alice));

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_user_reaches_only_the_target() {
        let manager = WebSocketManager::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.register(alice, tx_a);
        manager.register(bob, tx_b);

        assert!(manager.send_to_user(alice, envelope()));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_disconnected_user_reports_failure() {
        let manager = WebSocketManager::new();
        assert!(!manager.send_to_user(Uuid::new_v4(), envelope()));
    }

    #[tokio::test]
    async fn dead_channel_is_pruned_on_send() {
        let manager = WebSocketManager::new();
        let alice = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        manager.register(alice, tx);

        assert!(!manager.send_to_user(alice, envelope()));
        assert!(!manager.is_connected(alice));
    }

    #[tokio::test]
    async fn unregister_removes_room_subscriptions() {
        let manager = WebSocketManager::new();
        let room = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        manager.register(alice, tx_a.clone());
        manager.register(bob, tx_b);
        manager.subscribe(room, alice);
        manager.subscribe(room, bob);

        manager.unregister(alice);
        // re-register channel without re-subscribing: broadcast must not
        // reach alice any more
        let (tx_a2, mut rx_a2) = mpsc::unbounded_channel();
        manager.register(alice, tx_a2);
        manager.broadcast_to_room(room, envelope(), None);

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a2.try_recv().is_err());
    }
}
