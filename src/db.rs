use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;

use crate::model::role::Role;

/// SQLSTATE MySQL reports for unique/foreign key violations.
pub const INTEGRITY_VIOLATION: &str = "23000";

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Inserts the bootstrap admin unless an admin account already exists.
/// Returns whether a row was written.
pub async fn seed_admin(pool: &MySqlPool, email: &str, password_hash: &str) -> Result<bool> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
        .bind(Role::Admin.id())
        .fetch_one(pool)
        .await
        .context("Failed to look up admin accounts")?;

    if admins > 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO users (username, password, role_id, staff_name, email, is_active)
        VALUES (?, ?, ?, 'Administrator', ?, TRUE)
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(Role::Admin.id())
    .bind(email)
    .execute(pool)
    .await
    .context("Failed to create bootstrap admin")?;

    Ok(true)
}

pub fn is_integrity_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(INTEGRITY_VIOLATION),
        _ => false,
    }
}
