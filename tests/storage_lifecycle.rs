//! Integration tests for the subscription lifecycle: add, read, reorder,
//! import/export and delete.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use lazyrss::feed::opml;
use lazyrss::ordering::{apply_to_list, open_feed, plan_reorder, Direction, ReorderPlan};
use lazyrss::storage::{Database, DatabaseError, NewEntry, NewFeed};
use pretty_assertions::assert_eq;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn entry(slug: &str, published_at: i64) -> NewEntry {
    NewEntry {
        title: format!("Post {}", slug),
        link: format!("https://example.com/{}", slug),
        description: "summary".to_string(),
        content: "<p>body</p>".to_string(),
        published_at,
    }
}

fn new_feed(url: &str, title: &str) -> NewFeed {
    NewFeed {
        url: url.to_string(),
        title: title.to_string(),
        description: String::new(),
    }
}

async fn titles(db: &Database) -> Vec<String> {
    db.list_feeds()
        .await
        .unwrap()
        .iter()
        .map(|f| f.title.to_string())
        .collect()
}

// ============================================================================
// Subscribe / Read
// ============================================================================

#[tokio::test]
async fn test_added_feed_shows_unread_until_opened() {
    let db = test_db().await;
    let feed_id = db.add_feed("https://example.com/rss", "Example", "").await.unwrap();
    db.save_entries(feed_id, &[entry("a", 1_000), entry("b", 2_000)])
        .await
        .unwrap();

    assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 2);

    let snapshot = open_feed(&db, feed_id).await.unwrap();
    assert_eq!(snapshot.watermark, 0);
    assert_eq!(snapshot.entries.len(), 2);
    // newest first
    assert_eq!(snapshot.entries[0].link.as_ref(), "https://example.com/b");

    assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 0);
}

#[tokio::test]
async fn test_unread_stays_zero_until_newer_entry() {
    let db = test_db().await;
    let feed_id = db.add_feed("https://example.com/rss", "Example", "").await.unwrap();
    db.save_entries(feed_id, &[entry("a", 1_000)]).await.unwrap();
    db.mark_feed_read(feed_id).await.unwrap();

    // re-merging the same entry changes nothing
    db.save_entries(feed_id, &[entry("a", 1_000)]).await.unwrap();
    assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 0);

    let future = chrono::Utc::now().timestamp() + 3_600;
    db.save_entries(feed_id, &[entry("later", future)]).await.unwrap();
    assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 1);

    // the watermark jumps past future-dated entries
    db.mark_feed_read(feed_id).await.unwrap();
    assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 0);
}

#[tokio::test]
async fn test_mark_entry_read_independent_of_watermark() {
    let db = test_db().await;
    let feed_id = db.add_feed("https://example.com/rss", "Example", "").await.unwrap();
    db.save_entries(feed_id, &[entry("a", 1_000)]).await.unwrap();

    let entries = db.list_entries(feed_id).await.unwrap();
    db.mark_entry_read(entries[0].id).await.unwrap();

    assert!(db.list_entries(feed_id).await.unwrap()[0].read);
    assert_eq!(db.list_feeds().await.unwrap()[0].unread_count, 1);
}

#[tokio::test]
async fn test_duplicate_subscription_is_not_an_error() {
    let db = test_db().await;
    let first = db.add_feed("https://example.com/rss", "Example", "").await.unwrap();
    let second = db.add_feed("https://example.com/rss", "Renamed", "").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(titles(&db).await, vec!["Example"]);
}

// ============================================================================
// Reorder
// ============================================================================

#[tokio::test]
async fn test_move_down_then_up_restores_order() {
    let db = test_db().await;
    db.add_feed("https://a.example.com/rss", "A", "").await.unwrap();
    db.add_feed("https://b.example.com/rss", "B", "").await.unwrap();

    let mut feeds = db.list_feeds().await.unwrap();
    let plan = plan_reorder(&feeds, 0, Direction::Down).unwrap();
    db.apply_reorder(&plan).await.unwrap();
    apply_to_list(&mut feeds, &plan);
    assert_eq!(titles(&db).await, vec!["B", "A"]);
    assert_eq!(feeds.iter().map(|f| f.title.to_string()).collect::<Vec<_>>(), vec!["B", "A"]);

    let feeds = db.list_feeds().await.unwrap();
    let plan = plan_reorder(&feeds, 1, Direction::Up).unwrap();
    db.apply_reorder(&plan).await.unwrap();
    assert_eq!(titles(&db).await, vec!["A", "B"]);
}

#[tokio::test]
async fn test_swap_positions_is_an_involution() {
    let db = test_db().await;
    let a = db.add_feed("https://a.example.com/rss", "A", "").await.unwrap();
    let b = db.add_feed("https://b.example.com/rss", "B", "").await.unwrap();

    db.swap_positions(a, 0, b, 1).await.unwrap();
    assert_eq!(titles(&db).await, vec!["B", "A"]);
    db.swap_positions(a, 1, b, 0).await.unwrap();
    assert_eq!(titles(&db).await, vec!["A", "B"]);
}

async fn three_feeds(db: &Database) {
    for name in ["a", "b", "c"] {
        db.add_feed(&format!("https://{}.example.com/rss", name), &name.to_uppercase(), "")
            .await
            .unwrap();
    }
}

/// Two Alt-Down presses on the first feed, planned against the list as the
/// UI sees it after each press.
async fn chained_moves(db: &Database) -> (ReorderPlan, ReorderPlan) {
    let mut feeds = db.list_feeds().await.unwrap();
    let first = plan_reorder(&feeds, 0, Direction::Down).unwrap();
    apply_to_list(&mut feeds, &first);
    let second = plan_reorder(&feeds, first.target_index, Direction::Down).unwrap();
    (first, second)
}

async fn positions(db: &Database) -> Vec<i64> {
    db.list_feeds().await.unwrap().iter().map(|f| f.position).collect()
}

#[tokio::test]
async fn test_chained_moves_in_order() {
    let db = test_db().await;
    three_feeds(&db).await;
    let (first, second) = chained_moves(&db).await;

    db.apply_reorder(&first).await.unwrap();
    db.apply_reorder(&second).await.unwrap();

    assert_eq!(titles(&db).await, vec!["B", "C", "A"]);
    assert_eq!(positions(&db).await, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_chained_moves_out_of_order_never_duplicate_positions() {
    let db = test_db().await;
    three_feeds(&db).await;
    let (first, second) = chained_moves(&db).await;

    let err = db.apply_reorder(&second).await.unwrap_err();
    assert!(matches!(err, DatabaseError::PositionConflict { .. }));
    assert_eq!(titles(&db).await, vec!["A", "B", "C"]);
    assert_eq!(positions(&db).await, vec![0, 1, 2]);

    db.apply_reorder(&first).await.unwrap();
    db.apply_reorder(&second).await.unwrap();
    assert_eq!(titles(&db).await, vec!["B", "C", "A"]);
    assert_eq!(positions(&db).await, vec![0, 1, 2]);
}

// ============================================================================
// Import / Export / Delete
// ============================================================================

#[tokio::test]
async fn test_opml_import_then_export_round_trip() {
    let db = test_db().await;
    let source = r#"<?xml version="1.0"?>
<opml version="2.0">
  <head><title>Mine</title></head>
  <body>
    <outline text="Tech">
      <outline type="rss" text="Rust Blog" xmlUrl="https://blog.rust-lang.org/feed.xml"/>
      <outline text="No title attr" xmlUrl="https://example.com/atom"/>
    </outline>
    <outline text="Just a folder"/>
  </body>
</opml>"#;

    let document = opml::parse_opml(source).unwrap();
    let candidates = opml::import_candidates(&opml::flatten(&document.outlines));
    assert_eq!(db.add_feeds(&candidates).await.unwrap(), 2);
    // a second import adds nothing
    assert_eq!(db.add_feeds(&candidates).await.unwrap(), 0);

    let feeds = db.list_feeds().await.unwrap();
    let outlines: Vec<opml::Outline> = feeds.iter().map(opml::Outline::from).collect();
    let exported = opml::generate(&outlines).unwrap();
    assert!(exported.contains("lazyrss feeds"));

    let reparsed = opml::parse_opml(&exported).unwrap();
    let urls: Vec<String> = opml::flatten(&reparsed.outlines)
        .into_iter()
        .map(|o| o.xml_url)
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://blog.rust-lang.org/feed.xml".to_string(),
            "https://example.com/atom".to_string()
        ]
    );
}

#[tokio::test]
async fn test_import_batch_keeps_existing_feeds() {
    let db = test_db().await;
    db.add_feed("https://a.example.com/rss", "A", "").await.unwrap();
    let added = db
        .add_feeds(&[
            new_feed("https://a.example.com/rss", "A again"),
            new_feed("https://b.example.com/rss", "B"),
        ])
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(titles(&db).await, vec!["A", "B"]);
}

#[tokio::test]
async fn test_delete_cascades_to_entries() {
    let db = test_db().await;
    let keep = db.add_feed("https://a.example.com/rss", "A", "").await.unwrap();
    let gone = db.add_feed("https://b.example.com/rss", "B", "").await.unwrap();
    db.save_entries(keep, &[entry("a1", 1)]).await.unwrap();
    db.save_entries(gone, &[entry("b1", 1), entry("b2", 2)]).await.unwrap();

    db.delete_feed(gone).await.unwrap();

    assert_eq!(titles(&db).await, vec!["A"]);
    assert!(db.list_entries(gone).await.unwrap().is_empty());
    assert_eq!(db.list_entries(keep).await.unwrap().len(), 1);

    // the link is free again once its feed is gone
    assert_eq!(db.save_entries(keep, &[entry("b1", 1)]).await.unwrap(), 1);
}
