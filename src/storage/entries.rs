use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{DatabaseError, Entry, EntryDbRow, NewEntry};

/// Maximum number of entries returned for one feed (OOM protection)
pub(super) const MAX_ENTRIES: i64 = 2000;

/// Entries of one feed, newest first. Binds `feed_id` then the row limit.
pub(super) const LIST_ENTRIES: &str = r#"
    SELECT id, feed_id, title, link, description, content, published_at, read
    FROM entries
    WHERE feed_id = ?
    ORDER BY published_at DESC, id DESC
    LIMIT ?
"#;

impl Database {
    // ========================================================================
    // Entry Operations
    // ========================================================================

    /// Merge synced entries into a feed, returns the number of new entries.
    ///
    /// Insert-if-absent keyed on `link`: re-syncing the same content is a
    /// no-op and existing rows (including their `read` flag) are never
    /// touched. The whole batch commits or nothing does.
    ///
    /// Batch size of 50 keeps us well under SQLite's 999 parameter limit
    /// (6 columns * 50 = 300).
    pub async fn save_entries(&self, feed_id: i64, entries: &[NewEntry]) -> Result<usize, DatabaseError> {
        if entries.is_empty() {
            return Ok(0);
        }

        const BATCH_SIZE: usize = 50;
        let mut tx = self.pool.begin().await?;
        let mut total_inserted: usize = 0;

        for chunk in entries.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO entries (feed_id, title, link, description, content, published_at) ",
            );

            builder.push_values(chunk, |mut b, entry| {
                b.push_bind(feed_id)
                    .push_bind(&entry.title)
                    .push_bind(&entry.link)
                    .push_bind(&entry.description)
                    .push_bind(&entry.content)
                    .push_bind(entry.published_at);
            });

            builder.build().execute(&mut *tx).await?;

            // changes() counts only rows the INSERT OR IGNORE actually wrote
            let changes: (i64,) = sqlx::query_as("SELECT changes()")
                .fetch_one(&mut *tx)
                .await?;
            total_inserted += changes.0 as usize;
        }

        tx.commit().await?;
        tracing::debug!(feed_id, received = entries.len(), inserted = total_inserted, "Saved entries");
        Ok(total_inserted)
    }

    /// Entries for a feed, newest first
    pub async fn list_entries(&self, feed_id: i64) -> Result<Vec<Entry>, DatabaseError> {
        let rows: Vec<EntryDbRow> = sqlx::query_as(LIST_ENTRIES)
            .bind(feed_id)
            .bind(MAX_ENTRIES)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(feed_id, count = rows.len(), "Loaded entries");
        Ok(rows.into_iter().map(EntryDbRow::into_entry).collect())
    }

    pub async fn mark_entry_read(&self, entry_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE entries SET read = 1 WHERE id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
