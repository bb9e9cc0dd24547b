use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, DatabaseError};

// ============================================================================
// Database
// ============================================================================

/// Handle to the feed store.
///
/// Constructed once at startup and cloned (pool handle) into the app state
/// and every background task. All multi-statement updates go through a
/// transaction on this pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another instance of lazyrss
    /// has the database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create the file owner-only before the pool touches it
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() {
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok(); // SQLite reports the real error at connect_with
            }
        }

        // busy_timeout=5000: wait up to 5 seconds for a competing writer
        // (a sync merge racing a reorder) before returning SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op. Ends with the position backfill for databases
    /// where no feed was ever reordered.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL DEFAULT 0,
                last_read_at INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL DEFAULT '',
                link TEXT UNIQUE NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                published_at INTEGER NOT NULL DEFAULT 0,
                read INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Serves both list_entries() ordering and the unread-count subquery
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entries_feed_published ON entries(feed_id, published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Backfill positions by title when every feed still sits at 0
        let (total, positioned): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN position != 0 THEN 1 ELSE 0 END), 0) FROM feeds",
        )
        .fetch_one(&mut *tx)
        .await?;

        if total > 1 && positioned == 0 {
            let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM feeds ORDER BY title ASC, id ASC")
                .fetch_all(&mut *tx)
                .await?;
            for (position, (id,)) in ids.iter().enumerate() {
                sqlx::query("UPDATE feeds SET position = ? WHERE id = ?")
                    .bind(position as i64)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            tracing::info!(feeds = ids.len(), "Initialized feed positions from title order");
        }

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_runs_migrations() {
        let db = Database::open(":memory:").await.unwrap();
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('feeds', 'entries')",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_backfills_zero_positions_by_title() {
        let db = Database::open(":memory:").await.unwrap();
        for (url, title) in [("https://c.example/feed", "Charlie"), ("https://a.example/feed", "Alpha"), ("https://b.example/feed", "Bravo")] {
            sqlx::query("INSERT INTO feeds (url, title, position) VALUES (?, ?, 0)")
                .bind(url)
                .bind(title)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        db.migrate().await.unwrap();

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT title, position FROM feeds ORDER BY position")
                .fetch_all(&db.pool)
                .await
                .unwrap();
        assert_eq!(
            rows,
            vec![
                ("Alpha".to_string(), 0),
                ("Bravo".to_string(), 1),
                ("Charlie".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_migrate_leaves_existing_positions_alone() {
        let db = Database::open(":memory:").await.unwrap();
        for (url, title, position) in [("https://a.example/feed", "Alpha", 5), ("https://b.example/feed", "Bravo", 0)] {
            sqlx::query("INSERT INTO feeds (url, title, position) VALUES (?, ?, ?)")
                .bind(url)
                .bind(title)
                .bind(position)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        db.migrate().await.unwrap();

        let (alpha,): (i64,) = sqlx::query_as("SELECT position FROM feeds WHERE title = 'Alpha'")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(alpha, 5);
    }
}
