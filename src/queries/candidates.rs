use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{db_error, AppResult},
    models::candidates::{CachedUserProfile, CandidateFilter},
};

pub async fn load_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Option<CachedUserProfile>> {
    let profile =
        sqlx::query_as::<_, CachedUserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(conn)
            .await
            .map_err(|e| db_error("profile lookup", e))?;

    Ok(profile)
}

/// Everyone currently opted into matching; feeds the scheduled cache
/// refresh.
pub async fn load_matchable_profiles(
    conn: &mut PgConnection,
) -> AppResult<Vec<CachedUserProfile>> {
    let profiles = sqlx::query_as::<_, CachedUserProfile>(
        "SELECT * FROM user_profiles WHERE matching_enabled = TRUE",
    )
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("matchable profiles", e))?;

    Ok(profiles)
}

/// Candidate list for one user under one filter; never returns the caller
/// or users who opted out of matching.
pub async fn load_candidates(
    conn: &mut PgConnection,
    for_user: Uuid,
    filter: &CandidateFilter,
) -> AppResult<Vec<CachedUserProfile>> {
    let profiles = sqlx::query_as::<_, CachedUserProfile>(
        "SELECT * FROM user_profiles
         WHERE matching_enabled = TRUE
           AND user_id <> $1
           AND ($2::int IS NULL OR budget_max >= $2)
           AND ($3::int IS NULL OR budget_min <= $3)
           AND ($4::bool IS NULL OR smoker = $4)
           AND ($5::bool IS NULL OR pets_ok = $5)
           AND ($6::bool IS NULL OR night_owl = $6)
         ORDER BY updated_at DESC",
    )
    .bind(for_user)
    .bind(filter.budget_min)
    .bind(filter.budget_max)
    .bind(filter.smoker)
    .bind(filter.pets_ok)
    .bind(filter.night_owl)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("candidate list", e))?;

    Ok(profiles)
}

pub struct PreferenceUpdate {
    pub bio: Option<String>,
    pub budget_min: i32,
    pub budget_max: i32,
    pub smoker: bool,
    pub pets_ok: bool,
    pub night_owl: bool,
    pub matching_enabled: bool,
}

pub async fn update_preferences(
    conn: &mut PgConnection,
    user_id: Uuid,
    update: &PreferenceUpdate,
) -> AppResult<CachedUserProfile> {
    let profile = sqlx::query_as::<_, CachedUserProfile>(
        "UPDATE user_profiles
         SET bio = $2, budget_min = $3, budget_max = $4,
             smoker = $5, pets_ok = $6, night_owl = $7,
             matching_enabled = $8, updated_at = now()
         WHERE user_id = $1
         RETURNING *",
    )
    .bind(user_id)
    .bind(&update.bio)
    .bind(update.budget_min)
    .bind(update.budget_max)
    .bind(update.smoker)
    .bind(update.pets_ok)
    .bind(update.night_owl)
    .bind(update.matching_enabled)
    .fetch_one(conn)
    .await
    .map_err(|e| db_error("preference update", e))?;

    Ok(profile)
}
