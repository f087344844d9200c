//! Persistence layer.
//!
//! Records which inbox items have already been handled so a restart never
//! answers the same mention twice. Backed by SQLite through `sqlx`.
//!
//! Table `posts`:
//! - `id`: short post/comment/message id, primary key
//! - `post_type`: `P`, `C` or `M`
//! - `has_request`: 1 if the item contained a valid equity query
//! - `seen_at`: RFC 3339 timestamp

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, error, warn};

use crate::types::{BotError, PostKind};

const CREATE_POSTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS posts(
    id TEXT PRIMARY KEY,
    post_type TEXT NOT NULL CHECK(post_type IN ('P', 'C', 'M')),
    has_request INTEGER NOT NULL CHECK(has_request IN (0, 1)),
    seen_at TEXT NOT NULL
)
"#;

/// A previously recorded item.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenRecord {
    pub id: String,
    pub kind: PostKind,
    pub has_request: bool,
}

/// The "already answered" table.
#[derive(Clone)]
pub struct SeenStore {
    pool: SqlitePool,
}

impl SeenStore {
    /// Open (creating if needed) the database and its table.
    pub async fn connect(database_url: &str) -> Result<Self, BotError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| BotError::Storage(format!("invalid database url {database_url}: {e}")))?
            .create_if_missing(true);

        // One connection keeps `sqlite::memory:` databases coherent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| BotError::Storage(format!("failed to open {database_url}: {e}")))?;

        sqlx::query(CREATE_POSTS_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Could not create posts table");
                BotError::Storage(format!("could not create posts table: {e}"))
            })?;

        debug!(database_url, "Seen store ready");
        Ok(Self { pool })
    }

    /// Whether an item id was already recorded.
    pub async fn is_seen(&self, id: &str) -> Result<bool, BotError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BotError::Storage(format!("lookup of {id} failed: {e}")))?;

        debug!(id, seen = count > 0, "Checked seen store");
        Ok(count > 0)
    }

    /// Record an item. Recording the same id twice is an error.
    pub async fn record(&self, id: &str, kind: PostKind, has_request: bool) -> Result<(), BotError> {
        let result = sqlx::query(
            "INSERT INTO posts (id, post_type, has_request, seen_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(kind.code())
        .bind(has_request as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(id, %kind, has_request, "Recorded item");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                warn!(id, "Attempted to record previously seen id");
                Err(BotError::Storage(format!("id {id} already recorded")))
            }
            Err(e) => Err(BotError::Storage(format!("insert of {id} failed: {e}"))),
        }
    }

    /// Fetch a recorded item.
    pub async fn get(&self, id: &str) -> Result<Option<SeenRecord>, BotError> {
        let row = sqlx::query("SELECT id, post_type, has_request FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BotError::Storage(format!("lookup of {id} failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let code: String = row.get("post_type");
        let kind = PostKind::from_code(&code)
            .ok_or_else(|| BotError::Storage(format!("bad post_type {code:?} for {id}")))?;
        let has_request: i64 = row.get("has_request");

        Ok(Some(SeenRecord {
            id: row.get("id"),
            kind,
            has_request: has_request != 0,
        }))
    }

    /// Number of recorded items.
    pub async fn count(&self) -> Result<u64, BotError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BotError::Storage(format!("count failed: {e}")))?;
        Ok(count as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
