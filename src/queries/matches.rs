use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{db_error, AppError, AppResult},
    models::matches::{MatchRecord, MatchResponse, MatchType},
};

/// All records for the unordered pair, either direction. At most one
/// non-terminal record exists per pair.
pub async fn find_pair_records(
    conn: &mut PgConnection,
    a: Uuid,
    b: Uuid,
) -> AppResult<Vec<MatchRecord>> {
    let records = sqlx::query_as::<_, MatchRecord>(
        "SELECT * FROM matches
         WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1)",
    )
    .bind(a)
    .bind(b)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("pair records", e))?;

    Ok(records)
}

pub async fn insert_match(
    conn: &mut PgConnection,
    sender_id: Uuid,
    receiver_id: Uuid,
    match_type: MatchType,
    preference_score: f64,
) -> AppResult<MatchRecord> {
    let record = sqlx::query_as::<_, MatchRecord>(
        "INSERT INTO matches (sender_id, receiver_id, match_type, preference_score)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(sender_id)
    .bind(receiver_id)
    .bind(match_type)
    .bind(preference_score)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict(anyhow::anyhow!("relationship already exists"));
            }
        }
        db_error("match insert", e)
    })?;

    Ok(record)
}

/// Upgrades an existing like to a formal roommate request in place. The
/// response slots are left untouched; only the type changes.
pub async fn upgrade_to_request(conn: &mut PgConnection, id: i32) -> AppResult<MatchRecord> {
    let record = sqlx::query_as::<_, MatchRecord>(
        "UPDATE matches SET match_type = 'request' WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(conn)
    .await
    .map_err(|e| db_error("match upgrade", e))?;

    Ok(record)
}

/// Locks the record for the duration of the response transaction so two
/// concurrent respond() calls serialize on the row.
pub async fn get_match_for_update(conn: &mut PgConnection, id: i32) -> AppResult<MatchRecord> {
    let record = sqlx::query_as::<_, MatchRecord>("SELECT * FROM matches WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_error("match lookup", e))?;

    record.ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Match not found")))
}

/// Writes both response slots and the derived status. `confirmed_at` is
/// stamped exactly once, on the transition into a terminal status.
pub async fn update_responses(
    conn: &mut PgConnection,
    id: i32,
    sender_response: MatchResponse,
    receiver_response: MatchResponse,
    match_status: MatchResponse,
) -> AppResult<MatchRecord> {
    let terminal = match_status != MatchResponse::Pending;
    let record = sqlx::query_as::<_, MatchRecord>(
        "UPDATE matches
         SET sender_response = $2,
             receiver_response = $3,
             match_status = $4,
             confirmed_at = CASE WHEN $5 AND confirmed_at IS NULL THEN now() ELSE confirmed_at END
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(sender_response)
    .bind(receiver_response)
    .bind(match_status)
    .bind(terminal)
    .fetch_one(conn)
    .await
    .map_err(|e| db_error("match response update", e))?;

    Ok(record)
}

/// Withdrawing from matching forfeits every pending record and every plain
/// like, but keeps confirmed roommate matches.
pub async fn delete_unconfirmed_for_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        "DELETE FROM matches
         WHERE (sender_id = $1 OR receiver_id = $1)
           AND NOT (match_type = 'request' AND match_status = 'accepted')",
    )
    .bind(user_id)
    .execute(conn)
    .await
    .map_err(|e| db_error("match bulk delete", e))?;

    Ok(result.rows_affected())
}

pub async fn list_for_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<MatchRecord>> {
    let records = sqlx::query_as::<_, MatchRecord>(
        "SELECT * FROM matches
         WHERE sender_id = $1 OR receiver_id = $1
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("match list", e))?;

    Ok(records)
}
