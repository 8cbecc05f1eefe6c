use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use tower_sessions::Session;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{candidates::CandidateFilter, sessions::UserSession},
    queries::candidates::{update_preferences, PreferenceUpdate},
};

/// Candidate recommendations, served through the cache.
pub async fn list_candidates(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<CandidateFilter>,
) -> AppResult<impl IntoResponse> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow!("User session not found")));
        }
    };

    let candidates = state
        .candidate_cache
        .get_candidates(&state.db_pool, user_id, &filter)
        .await?;

    Ok(Json(candidates.as_ref().clone()))
}

#[derive(serde::Deserialize, Validate)]
pub struct PreferencesPayload {
    #[validate(length(max = 500, message = "Bio is too long"))]
    pub bio: Option<String>,
    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget_min: i32,
    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget_max: i32,
    pub smoker: bool,
    pub pets_ok: bool,
    pub night_owl: bool,
    pub matching_enabled: bool,
}

/// Persists a preference mutation and applies the cache invalidation
/// contract: the caller's profile entry plus every filtered candidate list,
/// since the change can alter this user's eligibility for anyone else.
pub async fn set_preferences(
    State(state): State<AppState>,
    session: Session,
    Json(mut payload): Json<PreferencesPayload>,
) -> AppResult<impl IntoResponse> {
    let user_session = session
        .get::<UserSession>("user")
        .await
        .map_err(|_| AppError::Unauthorized(anyhow!("Cannot find user session")))?;

    let user_id = match user_session {
        Some(user_data) => user_data.user_id,
        None => {
            return Err(AppError::Unauthorized(anyhow!("User session not found")));
        }
    };

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(anyhow!("Invalid preferences: {}", e)))?;

    if payload.budget_min > payload.budget_max {
        return Err(AppError::BadRequest(anyhow!(
            "budget_min cannot exceed budget_max"
        )));
    }
    if let Some(bio) = &mut payload.bio {
        *bio = bio.trim().to_string();
    }

    let mut conn = state.db_pool.acquire().await.map_err(|e| {
        AppError::InternalServerError(anyhow!("Failed to acquire database connection: {}", e))
    })?;

    let profile = update_preferences(
        &mut conn,
        user_id,
        &PreferenceUpdate {
            bio: payload.bio,
            budget_min: payload.budget_min,
            budget_max: payload.budget_max,
            smoker: payload.smoker,
            pets_ok: payload.pets_ok,
            night_owl: payload.night_owl,
            matching_enabled: payload.matching_enabled,
        },
    )
    .await?;

    state.candidate_cache.invalidate_profile(user_id);
    state.candidate_cache.invalidate_candidate_lists();

    Ok(Json(profile))
}
