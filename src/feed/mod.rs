//! Feed retrieval, parsing, synchronization and OPML exchange.
//!
//! - [`parser`] converts RSS/Atom bytes into storable entries (`feed-rs`)
//! - [`fetcher`] does the HTTP side: timeout, retry, size limit
//! - [`sync`] fans fetch-and-merge jobs out over many feeds
//! - [`opml`] reads and writes subscription lists

mod fetcher;
pub mod opml;
mod parser;
mod sync;

pub use fetcher::{fetch, FetchError};
pub use parser::ParsedFeed;
pub use sync::{add_feed_from_url, sync_all, sync_one, SyncError, SyncOptions, SyncOutcome};
