use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::{
    error::{db_error, AppResult},
    models::candidates::{CachedUserProfile, CandidateFilter},
    queries::candidates as candidate_queries,
};

/// Clock is injected so TTL expiry is testable without sleeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<T> {
    value: T,
    cached_at: Instant,
}

/// Read-through cache over matchable profiles: per-user profile entries and
/// per-(user, filter) candidate lists, each with its own TTL.
///
/// Shared by many writers and readers with no exclusive lock; staleness
/// inside the TTL window is accepted. Any profile or preference mutation
/// must call `invalidate_profile` for the user and `invalidate_candidate_lists`
/// wholesale, since a single preference change can alter that user's
/// eligibility in any other user's filtered list. The scheduled refresh
/// bounds staleness even when an invalidation call is lost to a crash.
#[derive(Clone)]
pub struct CandidateCache {
    profiles: Arc<DashMap<Uuid, Entry<CachedUserProfile>>>,
    lists: Arc<DashMap<(Uuid, u64), Entry<Arc<Vec<CachedUserProfile>>>>>,
    profile_ttl: Duration,
    list_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CandidateCache {
    pub fn new(profile_ttl: Duration, list_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            profiles: Arc::new(DashMap::new()),
            lists: Arc::new(DashMap::new()),
            profile_ttl,
            list_ttl,
            clock,
        }
    }

    fn fresh<T>(&self, entry: &Entry<T>, ttl: Duration) -> bool {
        self.clock.now().duration_since(entry.cached_at) < ttl
    }

    /// Read-through profile lookup. A missing profile is not cached, so a
    /// user created moments later becomes visible on the next call.
    pub async fn get_profile(
        &self,
        pool: &PgPool,
        user_id: Uuid,
    ) -> AppResult<Option<CachedUserProfile>> {
        if let Some(entry) = self.profiles.get(&user_id) {
            if self.fresh(&entry, self.profile_ttl) {
                return Ok(Some(entry.value.clone()));
            }
        }

        let mut conn = pool.acquire().await.map_err(|e| db_error("cache profile", e))?;
        let profile = candidate_queries::load_profile(&mut conn, user_id).await?;

        if let Some(profile) = &profile {
            self.profiles.insert(
                user_id,
                Entry {
                    value: profile.clone(),
                    cached_at: self.clock.now(),
                },
            );
        } else {
            self.profiles.remove(&user_id);
        }

        Ok(profile)
    }

    /// Read-through filtered candidate list for one user.
    pub async fn get_candidates(
        &self,
        pool: &PgPool,
        for_user: Uuid,
        filter: &CandidateFilter,
    ) -> AppResult<Arc<Vec<CachedUserProfile>>> {
        let key = (for_user, filter.cache_key());
        if let Some(entry) = self.lists.get(&key) {
            if self.fresh(&entry, self.list_ttl) {
                return Ok(entry.value.clone());
            }
        }

        let mut conn = pool.acquire().await.map_err(|e| db_error("cache candidates", e))?;
        let candidates =
            Arc::new(candidate_queries::load_candidates(&mut conn, for_user, filter).await?);

        self.lists.insert(
            key,
            Entry {
                value: candidates.clone(),
                cached_at: self.clock.now(),
            },
        );

        Ok(candidates)
    }

    /// Called by every mutation of the user's profile, preferences or
    /// matching flag.
    pub fn invalidate_profile(&self, user_id: Uuid) {
        self.profiles.remove(&user_id);
    }

    /// Wholesale: one changed profile can surface in any other user's
    /// filtered list, so under-invalidation would leak stale candidates.
    pub fn invalidate_candidate_lists(&self) {
        self.lists.clear();
    }

    /// Unconditional reload used by the scheduler. Repopulates every
    /// matchable profile and drops all filtered lists.
    pub async fn refresh_all(&self, pool: &PgPool) -> AppResult<usize> {
        let mut conn = pool.acquire().await.map_err(|e| db_error("cache refresh", e))?;
        let profiles = candidate_queries::load_matchable_profiles(&mut conn).await?;
        let count = profiles.len();

        let now = self.clock.now();
        self.profiles.clear();
        for profile in profiles {
            self.profiles.insert(
                profile.user_id,
                Entry {
                    value: profile,
                    cached_at: now,
                },
            );
        }
        self.lists.clear();

        Ok(count)
    }

    #[cfg(test)]
    fn insert_profile_for_test(&self, profile: CachedUserProfile) {
        self.profiles.insert(
            profile.user_id,
            Entry {
                value: profile,
                cached_at: self.clock.now(),
            },
        );
    }

    #[cfg(test)]
    fn insert_list_for_test(&self, key: (Uuid, u64), list: Vec<CachedUserProfile>) {
        self.lists.insert(
            key,
            Entry {
                value: Arc::new(list),
                cached_at: self.clock.now(),
            },
        );
    }

    #[cfg(test)]
    fn cached_profile(&self, user_id: Uuid) -> Option<CachedUserProfile> {
        self.profiles.get(&user_id).and_then(|entry| {
            self.fresh(&entry, self.profile_ttl)
                .then(|| entry.value.clone())
        })
    }

    #[cfg(test)]
    fn cached_list(&self, key: (Uuid, u64)) -> Option<Arc<Vec<CachedUserProfile>>> {
        self.lists.get(&key).and_then(|entry| {
            self.fresh(&entry, self.list_ttl)
                .then(|| entry.value.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn profile(user_id: Uuid) -> CachedUserProfile {
        CachedUserProfile {
            user_id,
            display_name: "casey".to_string(),
            bio: None,
            budget_min: 400,
            budget_max: 900,
            smoker: false,
            pets_ok: true,
            night_owl: false,
            matching_enabled: true,
            updated_at: Utc::now(),
        }
    }

    fn cache_with_clock() -> (CandidateCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = CandidateCache::new(
            Duration::from_secs(60),
            Duration::from_secs(30),
            clock.clone(),
        );
        (cache, clock)
    }

    #[test]
    fn profile_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock();
        let user = Uuid::new_v4();
        cache.insert_profile_for_test(profile(user));

        assert!(cache.cached_profile(user).is_some());
        clock.advance(Duration::from_secs(61));
        assert!(cache.cached_profile(user).is_none());
    }

    #[test]
    fn list_ttl_is_independent_of_profile_ttl() {
        let (cache, clock) = cache_with_clock();
        let user = Uuid::new_v4();
        let key = (user, CandidateFilter::default().cache_key());
        cache.insert_profile_for_test(profile(user));
        cache.insert_list_for_test(key, vec![profile(Uuid::new_v4())]);

        clock.advance(Duration::from_secs(31));
        assert!(cache.cached_list(key).is_none());
        assert!(cache.cached_profile(user).is_some());
    }

    #[test]
    fn profile_invalidation_removes_only_that_user() {
        let (cache, _) = cache_with_clock();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        cache.insert_profile_for_test(profile(a));
        cache.insert_profile_for_test(profile(b));

        cache.invalidate_profile(a);
        assert!(cache.cached_profile(a).is_none());
        assert!(cache.cached_profile(b).is_some());
    }

    #[test]
    fn list_invalidation_is_wholesale() {
        let (cache, _) = cache_with_clock();
        let a = (Uuid::new_v4(), CandidateFilter::default().cache_key());
        let filter = CandidateFilter {
            smoker: Some(false),
            ..Default::default()
        };
        let b = (Uuid::new_v4(), filter.cache_key());
        cache.insert_list_for_test(a, vec![]);
        cache.insert_list_for_test(b, vec![]);

        cache.invalidate_candidate_lists();
        assert!(cache.cached_list(a).is_none());
        assert!(cache.cached_list(b).is_none());
    }

    #[test]
    fn distinct_filters_get_distinct_entries() {
        let (cache, _) = cache_with_clock();
        let user = Uuid::new_v4();
        let loose = CandidateFilter::default();
        let strict = CandidateFilter {
            pets_ok: Some(true),
            ..Default::default()
        };
        cache.insert_list_for_test((user, loose.cache_key()), vec![]);

        assert!(cache.cached_list((user, loose.cache_key())).is_some());
        assert!(cache.cached_list((user, strict.cache_key())).is_none());
    }
}
