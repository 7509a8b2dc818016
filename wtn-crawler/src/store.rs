//! Persisted store access
//!
//! The core needs only a handful of operations: read every stored work item
//! once at run start, write one batch of inserts/updates, and look up the
//! subscribers of an item. [`CatalogStore`] names exactly those (plus the
//! subscription intake used by the CLI); [`SqliteCatalogStore`] implements them
//! on the shared `webtoons.db`.

use crate::catalog::{DayTag, TitleId, WorkStatus};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use wtn_common::{Error, Result};

/// Rows per multi-row INSERT; 5 bound columns each keeps us under SQLite's
/// default 999 host-parameter limit.
const INSERT_CHUNK_ROWS: usize = 150;

/// One row of the `webtoons` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredWork {
    pub id: TitleId,
    pub title: String,
    pub author: Option<String>,
    pub day_tag: DayTag,
    pub status: WorkStatus,
}

/// Prior run's state, keyed by work item ID
pub type PriorState = HashMap<TitleId, StoredWork>;

/// Subscriber lookup by work item
#[async_trait]
pub trait SubscriberLookup: Send + Sync {
    async fn subscribers_for(&self, id: TitleId) -> Result<Vec<String>>;
}

/// Everything the reconciliation engine reads from or writes to the store
#[async_trait]
pub trait CatalogStore: SubscriberLookup {
    /// Read all stored work items (once per run)
    async fn load_prior_state(&self) -> Result<PriorState>;

    /// Write one batch atomically: either every row lands or none does
    async fn apply_batch(&self, inserts: &[StoredWork], updates: &[StoredWork]) -> Result<()>;

    /// Idempotent; returns true if a new subscription row was created
    async fn add_subscription(&self, email: &str, id: TitleId) -> Result<bool>;

    async fn title_of(&self, id: TitleId) -> Result<Option<String>>;
}

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredWork> {
    let id: i64 = row.try_get("title_id")?;
    let status_text: String = row.try_get("status")?;
    let weekday: Option<String> = row.try_get("weekday")?;

    let status = WorkStatus::parse(&status_text).ok_or_else(|| {
        Error::CorruptRow(format!("title_id {}: unknown status '{}'", id, status_text))
    })?;

    // Unknown or missing weekday is not worth failing the run over
    let day_tag = weekday
        .as_deref()
        .and_then(DayTag::parse)
        .unwrap_or(DayTag::Unassigned);

    Ok(StoredWork {
        id,
        title: row.try_get("title_text")?,
        author: row.try_get("author")?,
        day_tag,
        status,
    })
}

#[async_trait]
impl SubscriberLookup for SqliteCatalogStore {
    async fn subscribers_for(&self, id: TitleId) -> Result<Vec<String>> {
        let emails: Vec<String> =
            sqlx::query_scalar("SELECT email FROM subscriptions WHERE title_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        Ok(emails)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn load_prior_state(&self) -> Result<PriorState> {
        let rows = sqlx::query("SELECT title_id, title_text, author, weekday, status FROM webtoons")
            .fetch_all(&self.pool)
            .await?;

        let mut prior = PriorState::with_capacity(rows.len());
        for row in &rows {
            let work = decode_row(row)?;
            prior.insert(work.id, work);
        }

        tracing::debug!(count = prior.len(), "Loaded prior state");
        Ok(prior)
    }

    async fn apply_batch(&self, inserts: &[StoredWork], updates: &[StoredWork]) -> Result<()> {
        if inserts.is_empty() && updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for chunk in inserts.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO webtoons (title_id, title_text, author, weekday, status) ",
            );
            builder.push_values(chunk, |mut b, work| {
                b.push_bind(work.id)
                    .push_bind(&work.title)
                    .push_bind(&work.author)
                    .push_bind(work.day_tag.as_str())
                    .push_bind(work.status.as_str());
            });
            builder.build().execute(&mut *tx).await?;
        }

        for work in updates {
            sqlx::query(
                r#"
                UPDATE webtoons
                SET title_text = ?, author = ?, weekday = ?, status = ?
                WHERE title_id = ?
                "#,
            )
            .bind(&work.title)
            .bind(&work.author)
            .bind(work.day_tag.as_str())
            .bind(work.status.as_str())
            .bind(work.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            inserted = inserts.len(),
            updated = updates.len(),
            "Committed reconciliation batch"
        );
        Ok(())
    }

    async fn add_subscription(&self, email: &str, id: TitleId) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO subscriptions (email, title_id) VALUES (?, ?)")
                .bind(email)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn title_of(&self, id: TitleId) -> Result<Option<String>> {
        let title: Option<String> =
            sqlx::query_scalar("SELECT title_text FROM webtoons WHERE title_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(title)
    }
}
