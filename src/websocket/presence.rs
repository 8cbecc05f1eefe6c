use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Tracks which user currently has an open view onto which chatroom. The
/// send pipeline consults it to decide whether the partner needs a durable
/// notification: the trigger is exactly "recipient not present at send
/// time". Being connected is not enough; the client declares the room it is
/// looking at with enter_room/leave_room frames.
#[derive(Clone)]
pub struct PresenceTracker {
    // chatroom_id -> users viewing it
    viewers: Arc<DashMap<Uuid, Arc<DashMap<Uuid, ()>>>>,
    // user_id -> rooms they are viewing, for disconnect cleanup
    user_views: Arc<DashMap<Uuid, Arc<DashMap<Uuid, ()>>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            viewers: Arc::new(DashMap::new()),
            user_views: Arc::new(DashMap::new()),
        }
    }

    pub fn enter(&self, chatroom_id: Uuid, user_id: Uuid) {
        let viewers = self
            .viewers
            .entry(chatroom_id)
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();
        viewers.insert(user_id, ());

        let views = self
            .user_views
            .entry(user_id)
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();
        views.insert(chatroom_id, ());
    }

    pub fn leave(&self, chatroom_id: Uuid, user_id: Uuid) {
        if let Some(viewers) = self.viewers.get(&chatroom_id) {
            viewers.remove(&user_id);
            if viewers.is_empty() {
                drop(viewers);
                self.viewers.remove(&chatroom_id);
            }
        }
        if let Some(views) = self.user_views.get(&user_id) {
            views.remove(&chatroom_id);
        }
    }

    /// Disconnect wipes every view the user held.
    pub fn clear_user(&self, user_id: Uuid) {
        if let Some((_, views)) = self.user_views.remove(&user_id) {
            for room in views.iter() {
                if let Some(viewers) = self.viewers.get(room.key()) {
                    viewers.remove(&user_id);
                    if viewers.is_empty() {
                        drop(viewers);
                        self.viewers.remove(room.key());
                    }
                }
            }
        }
    }

    pub fn is_present(&self, chatroom_id: Uuid, user_id: Uuid) -> bool {
        self.viewers
            .get(&chatroom_id)
            .map(|viewers| viewers.contains_key(&user_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_is_present_only_while_viewing() {
        let presence = PresenceTracker::new();
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(!presence.is_present(room, user));
        presence.enter(room, user);
        assert!(presence.is_present(room, user));
        presence.leave(room, user);
        assert!(!presence.is_present(room, user));
    }

    #[test]
    fn presence_is_per_room() {
        let presence = PresenceTracker::new();
        let (room_a, room_b) = (Uuid::new_v4(), Uuid::new_v4());
        let user = Uuid::new_v4();

        presence.enter(room_a, user);
        assert!(presence.is_present(room_a, user));
        assert!(!presence.is_present(room_b, user));
    }

    #[test]
    fn disconnect_clears_every_view() {
        let presence = PresenceTracker::new();
        let (room_a, room_b) = (Uuid::new_v4(), Uuid::new_v4());
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        presence.enter(room_a, user);
        presence.enter(room_b, user);
        presence.enter(room_a, other);

        presence.clear_user(user);
        assert!(!presence.is_present(room_a, user));
        assert!(!presence.is_present(room_b, user));
        assert!(presence.is_present(room_a, other));
    }

    #[test]
    fn leave_is_idempotent() {
        let presence = PresenceTracker::new();
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        presence.leave(room, user);
        presence.enter(room, user);
        presence.leave(room, user);
        presence.leave(room, user);
        assert!(!presence.is_present(room, user));
    }
}
