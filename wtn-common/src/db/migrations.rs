//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in `schema_version`.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already ran them
//! 2. **Always add new migrations** - one function per schema or data change
//! 3. **Idempotent** - each migration must be safe to re-run

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Status labels written by the legacy crawler, mapped to current tags
const LEGACY_STATUS_LABELS: &[(&str, &str)] = &[("연재중", "ongoing"), ("완결", "finished")];

/// Weekday labels written by the legacy crawler, mapped to current day tags
const LEGACY_WEEKDAY_LABELS: &[(&str, &str)] = &[
    ("월", "mon"),
    ("화", "tue"),
    ("수", "wed"),
    ("목", "thu"),
    ("금", "fri"),
    ("토", "sat"),
    ("일", "sun"),
    ("매일+", "daily"),
];

/// Get current schema version (0 if none recorded)
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    Ok(())
}

/// Migration v1: normalize legacy labels and index subscriber lookups
///
/// Databases created by the legacy crawler stored Korean status and weekday
/// labels. Rewrite them to the tags the reconciliation engine reads, so the
/// first run against an old database does not see every row as changed.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: normalize legacy labels, index subscriptions");

    let mut tx = pool.begin().await?;

    for (legacy, tag) in LEGACY_STATUS_LABELS {
        let result = sqlx::query("UPDATE webtoons SET status = ? WHERE status = ?")
            .bind(tag)
            .bind(legacy)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() > 0 {
            info!("  status '{}' -> '{}': {} rows", legacy, tag, result.rows_affected());
        }
    }

    for (legacy, tag) in LEGACY_WEEKDAY_LABELS {
        let result = sqlx::query("UPDATE webtoons SET weekday = ? WHERE weekday = ?")
            .bind(tag)
            .bind(legacy)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() > 0 {
            info!("  weekday '{}' -> '{}': {} rows", legacy, tag, result.rows_affected());
        }
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_title_id ON subscriptions(title_id)",
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
