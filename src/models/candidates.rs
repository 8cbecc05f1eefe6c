use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Denormalized snapshot of a user's identity and matching preferences, as
/// cached by the candidate cache. Value type; its only lifecycle is the
/// cache entry TTL.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CachedUserProfile {
    pub user_id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub budget_min: i32,
    pub budget_max: i32,
    pub smoker: bool,
    pub pets_ok: bool,
    pub night_owl: bool,
    pub matching_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied candidate filters. Hashed into the cache key for the
/// filtered-list cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CandidateFilter {
    pub budget_min: Option<i32>,
    pub budget_max: Option<i32>,
    pub smoker: Option<bool>,
    pub pets_ok: Option<bool>,
    pub night_owl: Option<bool>,
}

impl CandidateFilter {
    pub fn cache_key(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.budget_min.hash(&mut hasher);
        self.budget_max.hash(&mut hasher);
        self.smoker.hash(&mut hasher);
        self.pets_ok.hash(&mut hasher);
        self.night_owl.hash(&mut hasher);
        hasher.finish()
    }
}

/// Symmetric compatibility score in [0,1]: budget-range overlap and habit
/// agreement, equally weighted.
pub fn preference_score(a: &CachedUserProfile, b: &CachedUserProfile) -> f64 {
    let overlap_low = a.budget_min.max(b.budget_min);
    let overlap_high = a.budget_max.min(b.budget_max);
    let span = (a.budget_max.max(b.budget_max) - a.budget_min.min(b.budget_min)).max(1);
    let budget = ((overlap_high - overlap_low).max(0) as f64) / span as f64;

    let habits = [
        a.smoker == b.smoker,
        a.pets_ok == b.pets_ok,
        a.night_owl == b.night_owl,
    ];
    let agreement = habits.iter().filter(|m| **m).count() as f64 / habits.len() as f64;

    ((budget + agreement) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(budget_min: i32, budget_max: i32, smoker: bool) -> CachedUserProfile {
        CachedUserProfile {
            user_id: Uuid::new_v4(),
            display_name: "test".to_string(),
            bio: None,
            budget_min,
            budget_max,
            smoker,
            pets_ok: true,
            night_owl: false,
            matching_enabled: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn score_is_clamped_and_symmetric() {
        let a = profile(400, 800, false);
        let b = profile(600, 1200, true);
        let ab = preference_score(&a, &b);
        let ba = preference_score(&b, &a);
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn identical_preferences_score_one() {
        let a = profile(500, 900, false);
        let mut b = profile(500, 900, false);
        b.user_id = Uuid::new_v4();
        assert_eq!(preference_score(&a, &b), 1.0);
    }

    #[test]
    fn disjoint_budgets_and_opposed_habits_score_zero() {
        let mut a = profile(100, 200, true);
        let mut b = profile(900, 1000, false);
        a.pets_ok = false;
        a.night_owl = true;
        b.pets_ok = true;
        b.night_owl = false;
        assert_eq!(preference_score(&a, &b), 0.0);
    }

    #[test]
    fn filter_hash_is_stable_and_field_sensitive() {
        let f = CandidateFilter {
            budget_min: Some(300),
            ..Default::default()
        };
        assert_eq!(f.cache_key(), f.clone().cache_key());

        let g = CandidateFilter {
            budget_min: Some(400),
            ..Default::default()
        };
        assert_ne!(f.cache_key(), g.cache_key());
    }
}
