use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_type", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    Like,
    Request,
}

/// Shared domain for the two per-participant response slots and the derived
/// overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_response", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchResponse {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MatchRecord {
    pub id: i32,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub match_type: MatchType,
    pub match_status: MatchResponse,
    pub sender_response: MatchResponse,
    pub receiver_response: MatchResponse,
    pub preference_score: f64,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Convergence rule: the overall status is a pure function of the two
/// response slots and is recomputed after every response write. A rejection
/// from either side is absorbing.
pub fn derive_status(sender: MatchResponse, receiver: MatchResponse) -> MatchResponse {
    use MatchResponse::*;
    match (sender, receiver) {
        (Rejected, _) | (_, Rejected) => Rejected,
        (Accepted, Accepted) => Accepted,
        _ => Pending,
    }
}

impl MatchRecord {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id {
            self.receiver_id
        } else {
            self.sender_id
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.match_status != MatchResponse::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MatchResponse::*;

    #[test]
    fn status_stays_pending_until_both_respond() {
        assert_eq!(derive_status(Pending, Pending), Pending);
        assert_eq!(derive_status(Accepted, Pending), Pending);
        assert_eq!(derive_status(Pending, Accepted), Pending);
    }

    #[test]
    fn mutual_acceptance_confirms() {
        assert_eq!(derive_status(Accepted, Accepted), Accepted);
    }

    #[test]
    fn rejection_from_either_side_is_absorbing() {
        assert_eq!(derive_status(Rejected, Pending), Rejected);
        assert_eq!(derive_status(Pending, Rejected), Rejected);
        assert_eq!(derive_status(Rejected, Accepted), Rejected);
        assert_eq!(derive_status(Accepted, Rejected), Rejected);
        assert_eq!(derive_status(Rejected, Rejected), Rejected);
    }

    #[test]
    fn derivation_is_order_independent() {
        for a in [Pending, Accepted, Rejected] {
            for b in [Pending, Accepted, Rejected] {
                assert_eq!(derive_status(a, b), derive_status(b, a));
            }
        }
    }

    #[test]
    fn reapplying_a_response_is_a_no_op() {
        // Rewriting a slot with the value it already holds cannot change the
        // derived outcome, so a retried respond() call converges.
        for a in [Pending, Accepted, Rejected] {
            for b in [Pending, Accepted, Rejected] {
                assert_eq!(derive_status(a, b), derive_status(a, b));
            }
        }
    }
}
