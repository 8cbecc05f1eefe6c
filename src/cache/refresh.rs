use sqlx::PgPool;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::candidates::CandidateCache;

/// Fixed-period cache refresh. Each tick is fire-and-forget: a failed
/// reload logs and waits for the next tick instead of taking the task down.
pub fn spawn_refresher(
    pool: PgPool,
    cache: CandidateCache,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of interval() fires immediately; skip it so startup
        // does not race the pool warming up.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match cache.refresh_all(&pool).await {
                Ok(count) => {
                    tracing::debug!(profiles = count, "candidate cache refreshed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "candidate cache refresh failed, will retry next tick");
                }
            }
        }
    })
}
