use sqlx::QueryBuilder;

use super::entries::{LIST_ENTRIES, MAX_ENTRIES};
use super::schema::Database;
use super::types::{DatabaseError, Entry, EntryDbRow, Feed, FeedDbRow, NewFeed};
use crate::ordering::ReorderPlan;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// All feeds ordered by position then title, with unread counts.
    ///
    /// An entry is unread when it was published after the feed's
    /// `last_read_at` watermark.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedDbRow> = sqlx::query_as(
            r#"
                SELECT
                    f.id, f.url, f.title, f.description, f.created_at, f.last_read_at, f.position,
                    (SELECT COUNT(*) FROM entries e
                     WHERE e.feed_id = f.id AND e.published_at > f.last_read_at) AS unread_count
                FROM feeds f
                ORDER BY f.position ASC, f.title ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = rows.len(), "Loaded feeds");
        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Subscribe to a feed, appended after the last position.
    ///
    /// No-op when the URL is already subscribed; the existing id is returned.
    pub async fn add_feed(&self, url: &str, title: &str, description: &str) -> Result<i64, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let (next_position,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(position), -1) + 1 FROM feeds")
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO feeds (url, title, description, created_at, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(url)
        .bind(title)
        .bind(description)
        .bind(chrono::Utc::now().timestamp())
        .bind(next_position)
        .execute(&mut *tx)
        .await?;

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(id)
    }

    /// Subscribe to many feeds in one transaction (OPML import).
    ///
    /// Already-subscribed URLs are skipped. Returns how many feeds were new.
    pub async fn add_feeds(&self, feeds: &[NewFeed]) -> Result<usize, DatabaseError> {
        if feeds.is_empty() {
            return Ok(0);
        }

        const BATCH_SIZE: usize = 100;
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let (mut next_position,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(position), -1) + 1 FROM feeds")
                .fetch_one(&mut *tx)
                .await?;
        let mut added = 0usize;

        for chunk in feeds.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO feeds (url, title, description, created_at, position) ",
            );
            builder.push_values(chunk, |mut b, feed| {
                b.push_bind(&feed.url)
                    .push_bind(&feed.title)
                    .push_bind(&feed.description)
                    .push_bind(now)
                    .push_bind(next_position);
                next_position += 1;
            });
            builder.build().execute(&mut *tx).await?;

            let (changes,): (i64,) = sqlx::query_as("SELECT changes()")
                .fetch_one(&mut *tx)
                .await?;
            added += changes as usize;
        }

        tx.commit().await?;
        tracing::debug!(requested = feeds.len(), added, "Batch feed insert");
        Ok(added)
    }

    /// Unsubscribe. Entries go with the feed (ON DELETE CASCADE).
    pub async fn delete_feed(&self, feed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Exchange the positions of two feeds atomically.
    ///
    /// `pos_a`/`pos_b` are the positions `id_a`/`id_b` are expected to hold;
    /// afterwards `id_a` holds `pos_b` and `id_b` holds `pos_a`. If either
    /// feed has moved since, nothing is written and
    /// [`DatabaseError::PositionConflict`] is returned.
    pub async fn swap_positions(
        &self,
        id_a: i64,
        pos_a: i64,
        id_b: i64,
        pos_b: i64,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        swap_in_tx(&mut tx, id_a, pos_a, id_b, pos_b).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Apply a reorder plan: optional renumbering, then the swap, in one transaction.
    ///
    /// The swap only lands if both feeds still hold the positions the plan
    /// was computed from; otherwise the whole plan rolls back.
    pub async fn apply_reorder(&self, plan: &ReorderPlan) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        for &(feed_id, position) in &plan.renumber {
            sqlx::query("UPDATE feeds SET position = ? WHERE id = ?")
                .bind(position)
                .bind(feed_id)
                .execute(&mut *tx)
                .await?;
        }

        swap_in_tx(
            &mut tx,
            plan.moved.id,
            plan.moved.position,
            plan.neighbor.id,
            plan.neighbor.position,
        )
        .await?;

        tx.commit().await?;
        tracing::debug!(
            moved = plan.moved.id,
            neighbor = plan.neighbor.id,
            renumbered = plan.renumber.len(),
            "Applied feed reorder"
        );
        Ok(())
    }

    // ========================================================================
    // Read Watermark
    // ========================================================================

    /// Advance the feed's read watermark so its unread count drops to zero.
    pub async fn mark_feed_read(&self, feed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query(ADVANCE_WATERMARK)
            .bind(chrono::Utc::now().timestamp())
            .bind(feed_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read a feed's entries, snapshot its watermark and advance it, all in
    /// one transaction.
    ///
    /// Returns the entries with the watermark as it was *before* the update,
    /// so the caller can still highlight entries that were unread when the
    /// feed was opened. An entry merged by a concurrent sync is either in the
    /// returned list or lands after the new watermark.
    pub async fn open_entries(&self, feed_id: i64) -> Result<(Vec<Entry>, i64), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let (previous,): (i64,) = sqlx::query_as("SELECT last_read_at FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_one(&mut *tx)
            .await?;

        let rows: Vec<EntryDbRow> = sqlx::query_as(LIST_ENTRIES)
            .bind(feed_id)
            .bind(MAX_ENTRIES)
            .fetch_all(&mut *tx)
            .await?;

        sqlx::query(ADVANCE_WATERMARK)
            .bind(chrono::Utc::now().timestamp())
            .bind(feed_id)
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(feed_id, count = rows.len(), watermark = previous, "Opened feed");
        Ok((rows.into_iter().map(EntryDbRow::into_entry).collect(), previous))
    }
}

/// New watermark is `max(now, newest entry)` so future-dated items do not
/// stay unread after the feed has been opened.
const ADVANCE_WATERMARK: &str = r#"
    UPDATE feeds
    SET last_read_at = MAX(?, COALESCE((SELECT MAX(published_at) FROM entries WHERE feed_id = ?), 0))
    WHERE id = ?
"#;

async fn swap_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id_a: i64,
    pos_a: i64,
    id_b: i64,
    pos_b: i64,
) -> Result<(), DatabaseError> {
    // Both rows are checked before either is written
    let (matching,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM feeds WHERE (id = ? AND position = ?) OR (id = ? AND position = ?)",
    )
    .bind(id_a)
    .bind(pos_a)
    .bind(id_b)
    .bind(pos_b)
    .fetch_one(&mut **tx)
    .await?;
    if matching != 2 {
        tracing::debug!(id_a, pos_a, id_b, pos_b, "Stale reorder rejected");
        return Err(DatabaseError::PositionConflict { feed_id: id_a });
    }

    for (id, expected, position) in [(id_a, pos_a, pos_b), (id_b, pos_b, pos_a)] {
        let updated = sqlx::query("UPDATE feeds SET position = ? WHERE id = ? AND position = ?")
            .bind(position)
            .bind(id)
            .bind(expected)
            .execute(&mut **tx)
            .await?;
        if updated.rows_affected() != 1 {
            return Err(DatabaseError::PositionConflict { feed_id: id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewEntry;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_feed(id: i64) -> NewFeed {
        NewFeed {
            url: format!("https://feed{}.example.com/rss", id),
            title: format!("Feed {}", id),
            description: String::new(),
        }
    }

    fn test_entry(slug: &str, published_at: i64) -> NewEntry {
        NewEntry {
            title: format!("Entry {}", slug),
            link: format!("https://example.com/{}", slug),
            description: String::new(),
            content: String::new(),
            published_at,
        }
    }

    fn titles(feeds: &[Feed]) -> Vec<String> {
        feeds.iter().map(|f| f.title.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_feed_appends_position() {
        let db = test_db().await;
        db.add_feed("https://a.example/rss", "A", "first").await.unwrap();
        db.add_feed("https://b.example/rss", "B", "").await.unwrap();

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(titles(&feeds), vec!["A", "B"]);
        assert_eq!(feeds[0].position, 0);
        assert_eq!(feeds[1].position, 1);
        assert_eq!(feeds[0].description, "first");
        assert!(feeds[0].created_at > 0);
    }

    #[tokio::test]
    async fn test_add_feed_duplicate_url_is_noop() {
        let db = test_db().await;
        let id1 = db.add_feed("https://a.example/rss", "Original", "").await.unwrap();
        let id2 = db.add_feed("https://a.example/rss", "Renamed", "").await.unwrap();

        assert_eq!(id1, id2);
        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(&*feeds[0].title, "Original");
    }

    #[tokio::test]
    async fn test_add_feeds_counts_only_new() {
        let db = test_db().await;
        db.add_feed(&test_feed(1).url, "Existing", "").await.unwrap();

        let added = db
            .add_feeds(&[test_feed(1), test_feed(2), test_feed(3)])
            .await
            .unwrap();
        assert_eq!(added, 2);

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(titles(&feeds), vec!["Existing", "Feed 2", "Feed 3"]);
    }

    #[tokio::test]
    async fn test_add_feeds_batch_chunking() {
        let db = test_db().await;
        let feeds: Vec<NewFeed> = (0..250).map(test_feed).collect();

        let added = db.add_feeds(&feeds).await.unwrap();
        assert_eq!(added, 250);

        let listed = db.list_feeds().await.unwrap();
        assert_eq!(listed.len(), 250);
        let mut positions: Vec<i64> = listed.iter().map(|f| f.position).collect();
        positions.dedup();
        assert_eq!(positions.len(), 250, "positions must be distinct");
    }

    #[tokio::test]
    async fn test_add_feeds_empty() {
        let db = test_db().await;
        assert_eq!(db.add_feeds(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_feed_cascades_entries() {
        let db = test_db().await;
        let id = db.add_feed("https://a.example/rss", "A", "").await.unwrap();
        db.save_entries(id, &[test_entry("1", 100), test_entry("2", 200)])
            .await
            .unwrap();

        db.delete_feed(id).await.unwrap();

        assert!(db.list_feeds().await.unwrap().is_empty());
        let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_list_feeds_orders_by_position_then_title() {
        let db = test_db().await;
        for (url, title, position) in [
            ("https://z.example/rss", "Zulu", 0),
            ("https://b.example/rss", "Bravo", 1),
            ("https://a.example/rss", "Alpha", 1),
        ] {
            sqlx::query("INSERT INTO feeds (url, title, position) VALUES (?, ?, ?)")
                .bind(url)
                .bind(title)
                .bind(position)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(titles(&feeds), vec!["Zulu", "Alpha", "Bravo"]);
    }

    #[tokio::test]
    async fn test_swap_positions_twice_restores_order() {
        let db = test_db().await;
        let a = db.add_feed("https://a.example/rss", "A", "").await.unwrap();
        let b = db.add_feed("https://b.example/rss", "B", "").await.unwrap();

        db.swap_positions(a, 0, b, 1).await.unwrap();
        assert_eq!(titles(&db.list_feeds().await.unwrap()), vec!["B", "A"]);

        db.swap_positions(a, 1, b, 0).await.unwrap();
        assert_eq!(titles(&db.list_feeds().await.unwrap()), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_swap_positions_rejects_stale_positions() {
        let db = test_db().await;
        let a = db.add_feed("https://a.example/rss", "A", "").await.unwrap();
        let b = db.add_feed("https://b.example/rss", "B", "").await.unwrap();

        let err = db.swap_positions(a, 1, b, 0).await.unwrap_err();

        assert!(matches!(err, DatabaseError::PositionConflict { feed_id } if feed_id == a));
        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(titles(&feeds), vec!["A", "B"]);
        assert_eq!(feeds[0].position, 0);
        assert_eq!(feeds[1].position, 1);
    }

    #[tokio::test]
    async fn test_unread_count_uses_watermark() {
        let db = test_db().await;
        let id = db.add_feed("https://a.example/rss", "A", "").await.unwrap();
        db.save_entries(id, &[test_entry("1", 100), test_entry("2", 200)])
            .await
            .unwrap();

        assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 2);

        sqlx::query("UPDATE feeds SET last_read_at = 150 WHERE id = ?")
            .bind(id)
            .execute(&db.pool)
            .await
            .unwrap();
        assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 1);
    }

    #[tokio::test]
    async fn test_mark_feed_read_zeroes_unread_even_for_future_entries() {
        let db = test_db().await;
        let id = db.add_feed("https://a.example/rss", "A", "").await.unwrap();
        let future = chrono::Utc::now().timestamp() + 86_400;
        db.save_entries(id, &[test_entry("1", 100), test_entry("future", future)])
            .await
            .unwrap();

        db.mark_feed_read(id).await.unwrap();

        let feed = &db.list_feeds().await.unwrap()[0];
        assert_eq!(feed.unread_count, 0);
        assert!(feed.last_read_at >= future);
    }

    #[tokio::test]
    async fn test_open_entries_returns_previous_watermark() {
        let db = test_db().await;
        let id = db.add_feed("https://a.example/rss", "A", "").await.unwrap();
        db.save_entries(id, &[test_entry("1", 100)]).await.unwrap();

        let (entries, first) = db.open_entries(id).await.unwrap();
        assert_eq!(first, 0);
        assert_eq!(entries.len(), 1);

        let (_, second) = db.open_entries(id).await.unwrap();
        assert!(second > 0);
    }

    #[tokio::test]
    async fn test_open_entries_covers_every_listed_entry() {
        let db = test_db().await;
        let id = db.add_feed("https://a.example/rss", "A", "").await.unwrap();
        let future = chrono::Utc::now().timestamp() + 86_400;
        db.save_entries(id, &[test_entry("now", 100), test_entry("later", future)])
            .await
            .unwrap();

        let (entries, _) = db.open_entries(id).await.unwrap();

        let watermark = db.list_feeds().await.unwrap()[0].last_read_at;
        assert!(entries.iter().all(|e| e.published_at <= watermark));
    }

    #[tokio::test]
    async fn test_open_entries_missing_feed_errors() {
        let db = test_db().await;
        assert!(db.open_entries(42).await.is_err());
    }
}
