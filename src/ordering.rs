//! Feed ordering and unread tracking.
//!
//! Manual reordering is an adjacent-only transposition of stored positions.
//! Unread state is derived from a per-feed `last_read_at` watermark: an entry
//! is unread when it was published after the watermark.

use std::collections::HashSet;

use crate::storage::{Database, DatabaseError, Entry, Feed};

/// Direction of a manual reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// One feed's id and the position value it holds going into the swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: i64,
    pub position: i64,
}

/// Storage changes needed to move one feed past its neighbor.
///
/// `renumber` is empty unless the stored positions were degenerate (two
/// feeds sharing a value); in that case every feed is first assigned its
/// current list index so the swap produces a strict order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    pub renumber: Vec<(i64, i64)>,
    pub moved: Slot,
    pub neighbor: Slot,
    /// List index the moved feed ends up at
    pub target_index: usize,
}

/// Plan moving the feed at `index` one step in `direction`.
///
/// Returns `None` when the move would fall off either end of the list.
pub fn plan_reorder(feeds: &[Feed], index: usize, direction: Direction) -> Option<ReorderPlan> {
    let target_index = match direction {
        Direction::Up => index.checked_sub(1)?,
        Direction::Down => index.checked_add(1).filter(|&i| i < feeds.len())?,
    };
    let moved = feeds.get(index)?;
    let neighbor = feeds.get(target_index)?;

    if has_duplicate_positions(feeds) {
        let renumber = feeds
            .iter()
            .enumerate()
            .map(|(i, feed)| (feed.id, i as i64))
            .collect();
        return Some(ReorderPlan {
            renumber,
            moved: Slot {
                id: moved.id,
                position: index as i64,
            },
            neighbor: Slot {
                id: neighbor.id,
                position: target_index as i64,
            },
            target_index,
        });
    }

    Some(ReorderPlan {
        renumber: Vec::new(),
        moved: Slot {
            id: moved.id,
            position: moved.position,
        },
        neighbor: Slot {
            id: neighbor.id,
            position: neighbor.position,
        },
        target_index,
    })
}

/// Mirror a plan onto the in-memory list so the UI reflects it before the
/// write lands. Positions are rewritten exactly as storage will.
pub fn apply_to_list(feeds: &mut [Feed], plan: &ReorderPlan) {
    for (id, position) in &plan.renumber {
        if let Some(feed) = feeds.iter_mut().find(|f| f.id == *id) {
            feed.position = *position;
        }
    }
    for feed in feeds.iter_mut() {
        if feed.id == plan.moved.id {
            feed.position = plan.neighbor.position;
        } else if feed.id == plan.neighbor.id {
            feed.position = plan.moved.position;
        }
    }
    let from = match feeds.iter().position(|f| f.id == plan.moved.id) {
        Some(i) => i,
        None => return,
    };
    if plan.target_index < feeds.len() {
        feeds.swap(from, plan.target_index);
    }
}

fn has_duplicate_positions(feeds: &[Feed]) -> bool {
    let mut seen = HashSet::with_capacity(feeds.len());
    feeds.iter().any(|f| !seen.insert(f.position))
}

// ============================================================================
// Unread Tracking
// ============================================================================

/// Entries of a feed together with the watermark they should be judged against
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub entries: Vec<Entry>,
    /// `last_read_at` as it was before the feed was opened
    pub watermark: i64,
}

pub fn is_unread(entry: &Entry, watermark: i64) -> bool {
    entry.published_at > watermark
}

/// Open a feed for reading.
///
/// Loads the entries and snapshots and advances the watermark in one
/// transaction. The returned snapshot carries the *previous* watermark so
/// entries that were unread on open keep their marker even though the
/// stored watermark has already moved on.
pub async fn open_feed(db: &Database, feed_id: i64) -> Result<FeedSnapshot, DatabaseError> {
    let (entries, watermark) = db.open_entries(feed_id).await?;
    Ok(FeedSnapshot { entries, watermark })
}
