use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of lazyrss appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A reorder was planned against positions that have since changed
    #[error("Feed order changed before the move was saved (feed {feed_id})")]
    PositionConflict { feed_id: i64 },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN all mean another process owns the file.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Insert Types
// ============================================================================

/// A feed about to be subscribed (add-feed prompt or OPML import)
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// An entry produced by a sync, before it has an id
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub published_at: i64,
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for feed queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: i64,
    pub last_read_at: i64,
    pub position: i64,
    pub unread_count: i64,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            url: self.url,
            title: Arc::from(self.title),
            description: self.description,
            created_at: self.created_at,
            last_read_at: self.last_read_at,
            position: self.position,
            unread_count: self.unread_count,
        }
    }
}

/// Internal row type for entry queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub published_at: i64,
    pub read: bool,
}

impl EntryDbRow {
    pub(crate) fn into_entry(self) -> Entry {
        Entry {
            id: self.id,
            feed_id: self.feed_id,
            title: Arc::from(self.title),
            link: Arc::from(self.link),
            description: Arc::from(self.description),
            content: Arc::from(self.content),
            published_at: self.published_at,
            read: self.read,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed data from database.
///
/// `unread_count` is derived at query time from the `last_read_at` watermark
/// and is never stored. `title` is `Arc<str>` so list rebuilds clone cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: Arc<str>,
    pub description: String,
    pub created_at: i64,
    pub last_read_at: i64,
    pub position: i64,
    pub unread_count: i64,
}

/// Entry data from database.
///
/// Text fields are `Arc<str>`: entries are handed to render tasks on every
/// selection change and the bodies can be large.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: i64,
    pub feed_id: i64,
    pub title: Arc<str>,
    pub link: Arc<str>,
    pub description: Arc<str>,
    pub content: Arc<str>,
    pub published_at: i64,
    pub read: bool,
}
