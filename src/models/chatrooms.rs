use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomStatus {
    Active,
    Closed,
}

/// One room per unordered user pair. Participants are stored as
/// (smaller, larger) so both sides resolve to the same row.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Chatroom {
    pub id: Uuid,
    pub smaller_user_id: Uuid,
    pub larger_user_id: Uuid,
    pub smaller_status: RoomStatus,
    pub larger_status: RoomStatus,
    pub smaller_last_read_id: Option<i64>,
    pub larger_last_read_id: Option<i64>,
    pub last_message_id: Option<i64>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub blocked_by: Option<Uuid>,
    pub blocked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Canonical ordered key for a resource shared by two users, independent of
/// call order.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    (std::cmp::min(a, b), std::cmp::max(a, b))
}

impl Chatroom {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.smaller_user_id == user_id || self.larger_user_id == user_id
    }

    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.smaller_user_id == user_id {
            Some(self.larger_user_id)
        } else if self.larger_user_id == user_id {
            Some(self.smaller_user_id)
        } else {
            None
        }
    }

    pub fn side_status(&self, user_id: Uuid) -> Option<RoomStatus> {
        if self.smaller_user_id == user_id {
            Some(self.smaller_status)
        } else if self.larger_user_id == user_id {
            Some(self.larger_status)
        } else {
            None
        }
    }

    /// Writable iff the caller is a participant, their own side is ACTIVE and
    /// no block is in force. A block closes both sides, so checking the
    /// marker covers "blocked by the other participant" as well.
    pub fn is_writable_by(&self, user_id: Uuid) -> bool {
        self.side_status(user_id) == Some(RoomStatus::Active) && self.blocked_by.is_none()
    }
}

/// Room-list row: the room plus the caller's unread count, ordered by
/// coalesce(last_message_at, created_at).
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RoomListEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub room: Chatroom,
    pub unread_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(smaller: Uuid, larger: Uuid) -> Chatroom {
        Chatroom {
            id: Uuid::new_v4(),
            smaller_user_id: smaller,
            larger_user_id: larger,
            smaller_status: RoomStatus::Active,
            larger_status: RoomStatus::Active,
            smaller_last_read_id: None,
            larger_last_read_id: None,
            last_message_id: None,
            last_message_at: None,
            blocked_by: None,
            blocked_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn canonical_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
        let (smaller, larger) = canonical_pair(a, b);
        assert!(smaller <= larger);
    }

    #[test]
    fn writability_requires_own_side_active() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (smaller, larger) = canonical_pair(a, b);
        let mut r = room(smaller, larger);
        assert!(r.is_writable_by(smaller));
        assert!(r.is_writable_by(larger));

        // One side leaving closes only that side.
        r.smaller_status = RoomStatus::Closed;
        assert!(!r.is_writable_by(smaller));
        assert!(r.is_writable_by(larger));
    }

    #[test]
    fn block_makes_room_unwritable_for_both() {
        let (smaller, larger) = canonical_pair(Uuid::new_v4(), Uuid::new_v4());
        let mut r = room(smaller, larger);
        r.smaller_status = RoomStatus::Closed;
        r.larger_status = RoomStatus::Closed;
        r.blocked_by = Some(smaller);
        assert!(!r.is_writable_by(smaller));
        assert!(!r.is_writable_by(larger));
    }

    #[test]
    fn non_participant_is_never_writable() {
        let (smaller, larger) = canonical_pair(Uuid::new_v4(), Uuid::new_v4());
        let r = room(smaller, larger);
        assert!(!r.is_writable_by(Uuid::new_v4()));
        assert_eq!(r.side_status(Uuid::new_v4()), None);
    }
}
