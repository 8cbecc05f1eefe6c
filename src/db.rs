use anyhow::{Context, Ok, Result};
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use std::time::Duration;

pub async fn connect_to_db() -> Result<PgPool> {
    dotenv().ok();
    let db_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(20) // 20 concurrent connections
        // A saturated pool must fail the request, not hang it.
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await
        .context("Failed to connect to database")?;
    Ok(pool)
}
