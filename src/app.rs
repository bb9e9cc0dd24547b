use crate::config::Config;
use crate::feed::{SyncOptions, SyncOutcome};
use crate::keybindings::{Context, KeybindingRegistry};
use crate::ordering::{is_unread, FeedSnapshot, ReorderPlan};
use crate::picker::{FilePicker, PickerEntry};
use crate::render::RenderedContent;
use crate::storage::{Database, Entry, Feed};
use crate::util::strip_control_chars;
use anyhow::Result;
use ratatui::layout::Rect;
use reqwest::redirect::Policy;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;

/// Maximum scroll offset for the content pane (ratatui u16 limit).
pub const MAX_SCROLL: usize = u16::MAX as usize;

/// Render width used before the first frame reports the real one
const DEFAULT_CONTENT_WIDTH: u16 = 80;

/// Status messages disappear after this many seconds
const STATUS_TTL_SECS: u64 = 3;

// ============================================================================
// HTTP Client Configuration
// ============================================================================

/// Redirect policy: at most 3 hops, loops rejected.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

// ============================================================================
// View State
// ============================================================================

/// The three panes of the main view, in focus-cycling order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Feeds,
    Entries,
    Content,
}

impl Pane {
    pub const ALL: [Pane; 3] = [Pane::Feeds, Pane::Entries, Pane::Content];

    pub fn next(self) -> Self {
        match self {
            Pane::Feeds => Pane::Entries,
            Pane::Entries => Pane::Content,
            Pane::Content => Pane::Feeds,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Pane::Feeds => Pane::Content,
            Pane::Entries => Pane::Feeds,
            Pane::Content => Pane::Entries,
        }
    }

    /// Index of a list pane in per-list state (`filters`, `list_offsets`)
    pub fn list_slot(self) -> Option<usize> {
        match self {
            Pane::Feeds => Some(0),
            Pane::Entries => Some(1),
            Pane::Content => None,
        }
    }

    pub fn context(self) -> Context {
        match self {
            Pane::Feeds => Context::Feeds,
            Pane::Entries => Context::Entries,
            Pane::Content => Context::Content,
        }
    }
}

/// Exactly one mode is active at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Main { pane: Pane },
    /// Typing into the title filter of a list pane
    Filtering { pane: Pane },
    AddingFeed { input: String },
    ImportingFeeds { picker: FilePicker },
    Help { previous: Box<Mode> },
}

/// An entry row together with its unread marker for this viewing
#[derive(Debug, Clone, PartialEq)]
pub struct EntryItem {
    pub entry: Entry,
    pub unread: bool,
}

/// One row of a list pane
#[derive(Debug, Clone, Copy)]
pub enum PaneItem<'a> {
    Feed(&'a Feed),
    Entry(&'a EntryItem),
}

/// What the content pane shows
#[derive(Debug, Clone)]
pub enum ContentState {
    Empty,
    Loading {
        entry_id: i64,
    },
    Rendered {
        entry_id: i64,
        title: Arc<str>,
        width: u16,
        content: RenderedContent,
    },
    Error(String),
}

impl ContentState {
    pub fn entry_id(&self) -> Option<i64> {
        match self {
            ContentState::Loading { entry_id } | ContentState::Rendered { entry_id, .. } => Some(*entry_id),
            ContentState::Empty | ContentState::Error(_) => None,
        }
    }
}

// ============================================================================
// Commands and Events
// ============================================================================

/// Slow work requested by a state transition, run as a background task
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadFeeds,
    LoadEntries { feed_id: i64 },
    /// Render an entry at `width` and mark it read
    RenderEntry { entry: Entry, width: u16 },
    SyncAll,
    RefreshFeed { feed: Feed },
    AddFeed { url: String },
    ImportOpml { path: PathBuf },
    ExportOpml,
    DeleteFeed { feed_id: i64, title: Arc<str> },
    Reorder { plan: ReorderPlan },
    ListDir { dir: PathBuf },
    OpenUrl { url: String },
}

/// Events from background tasks
pub enum AppEvent {
    FeedsLoaded(Vec<Feed>),
    EntriesLoaded {
        feed_id: i64,
        snapshot: FeedSnapshot,
    },
    ContentRendered {
        entry_id: i64,
        title: Arc<str>,
        width: u16,
        content: RenderedContent,
    },
    SyncStarted {
        feeds: usize,
    },
    FeedSynced(SyncOutcome),
    /// Single-feed refresh finished; `result` is the new entry count
    FeedRefreshed {
        feed_id: i64,
        result: Result<usize, String>,
    },
    FeedAdded {
        feed_id: i64,
        url: String,
    },
    Imported {
        count: usize,
    },
    Exported {
        count: usize,
        path: PathBuf,
    },
    FeedDeleted {
        feed_id: i64,
        title: Arc<str>,
    },
    /// The reorder write finished; the next queued one may start
    Reordered,
    ReorderFailed {
        error: String,
    },
    DirListed {
        dir: PathBuf,
        result: Result<Vec<PickerEntry>, String>,
    },
    /// A storage or input failure, shown in the content pane
    Failed {
        error: String,
    },
    /// A background task panicked.
    ///
    /// - `task`: name of the task that panicked (e.g., "sync", "render")
    /// - `error`: the panic message extracted from the payload
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state, owned by the event loop
pub struct App {
    pub db: Database,
    pub http_client: reqwest::Client,
    pub keybindings: KeybindingRegistry,
    pub sync_options: SyncOptions,
    pub export_path: PathBuf,
    pub import_dir: PathBuf,

    pub mode: Mode,

    // Data
    pub feeds: Vec<Feed>,
    pub entries: Vec<EntryItem>,

    // Selection
    pub selected_feed: usize,
    pub selected_entry: usize,
    /// Feed whose entries are shown (or loading)
    pub current_feed: Option<i64>,
    /// Oldest watermark reported for the current feed since it was selected
    pub visit_watermark: Option<i64>,

    // Content pane
    pub content: ContentState,
    pub scroll_offset: usize,
    /// Inner size of the content pane from the last frame
    pub content_width: u16,
    pub content_height: usize,

    /// Pane rectangles from the last frame, for mouse hit-testing
    pub pane_areas: Option<[Rect; 3]>,
    /// First visible row of the feed and entry lists
    pub list_offsets: [usize; 2],
    /// Title filters of the feed and entry lists, empty when off
    pub filters: [String; 2],

    /// Feeds of the running sync that have not reported yet
    pub pending_sync: usize,
    /// A reorder write is running; later moves wait in `queued_reorders`
    pub reorder_in_flight: bool,
    pub queued_reorders: VecDeque<ReorderPlan>,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    /// An add or import is in flight
    pub loading: bool,

    pub needs_redraw: bool,
}

impl App {
    pub fn new(db: Database, keybindings: KeybindingRegistry, config: &Config, home: &Path) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .user_agent(concat!("lazyrss/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            db,
            http_client,
            keybindings,
            sync_options: SyncOptions::from(&config.sync),
            export_path: config.export_path(home),
            import_dir: config.import_dir(home),
            mode: Mode::Main { pane: Pane::Feeds },
            feeds: Vec::new(),
            entries: Vec::new(),
            selected_feed: 0,
            selected_entry: 0,
            current_feed: None,
            visit_watermark: None,
            content: ContentState::Empty,
            scroll_offset: 0,
            content_width: 0,
            content_height: 0,
            pane_areas: None,
            list_offsets: [0; 2],
            filters: Default::default(),
            pending_sync: 0,
            reorder_in_flight: false,
            queued_reorders: VecDeque::new(),
            status_message: None,
            loading: false,
            needs_redraw: true,
        })
    }

    /// Focused pane, when in the main view or filtering a list
    pub fn pane(&self) -> Option<Pane> {
        match self.mode {
            Mode::Main { pane } | Mode::Filtering { pane } => Some(pane),
            _ => None,
        }
    }

    pub fn selected_feed(&self) -> Option<&Feed> {
        self.feeds.get(self.selected_feed)
    }

    pub fn selected_entry(&self) -> Option<&EntryItem> {
        self.entries.get(self.selected_entry)
    }

    pub fn current_feed(&self) -> Option<&Feed> {
        let id = self.current_feed?;
        self.feeds.iter().find(|f| f.id == id)
    }

    /// Rows of a list pane that pass its filter; the content pane has none
    pub fn pane_items(&self, pane: Pane) -> Vec<PaneItem<'_>> {
        let rows = self.visible_rows(pane).into_iter();
        match pane {
            Pane::Feeds => rows.filter_map(|i| self.feeds.get(i)).map(PaneItem::Feed).collect(),
            Pane::Entries => rows.filter_map(|i| self.entries.get(i)).map(PaneItem::Entry).collect(),
            Pane::Content => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------------

    /// Title filter of a list pane, empty when none
    pub fn filter(&self, pane: Pane) -> &str {
        pane.list_slot().map_or("", |slot| self.filters[slot].as_str())
    }

    /// Indices into `feeds` or `entries` of the rows that pass the filter
    pub fn visible_rows(&self, pane: Pane) -> Vec<usize> {
        let query = self.filter(pane).to_lowercase();
        match pane {
            Pane::Feeds => matching_rows(&self.feeds, &query, |f| &*f.title),
            Pane::Entries => matching_rows(&self.entries, &query, |e| &*e.entry.title),
            Pane::Content => Vec::new(),
        }
    }

    fn selected_index(&self, pane: Pane) -> Option<usize> {
        match pane {
            Pane::Feeds => Some(self.selected_feed),
            Pane::Entries => Some(self.selected_entry),
            Pane::Content => None,
        }
    }

    /// Position of the selection among the visible rows, if it is shown
    pub fn visible_selection(&self, pane: Pane) -> Option<usize> {
        let selected = self.selected_index(pane)?;
        self.visible_rows(pane).iter().position(|&i| i == selected)
    }

    fn select_row(&mut self, pane: Pane, index: usize) -> Vec<Command> {
        match pane {
            Pane::Feeds => self.select_feed(index),
            Pane::Entries => self.select_entry(index),
            Pane::Content => Vec::new(),
        }
    }

    /// Move the selection `delta` visible rows, skipping filtered-out ones.
    ///
    /// A hidden selection jumps to the first visible row.
    pub fn step_selection(&mut self, pane: Pane, delta: isize) -> Vec<Command> {
        let rows = self.visible_rows(pane);
        let current = self
            .selected_index(pane)
            .and_then(|selected| rows.iter().position(|&i| i == selected));
        let target = match current {
            Some(at) => at.checked_add_signed(delta).and_then(|at| rows.get(at)),
            None => rows.first(),
        };
        match target {
            Some(&index) => self.select_row(pane, index),
            None => Vec::new(),
        }
    }

    /// Replace a list's filter.
    ///
    /// When the selected row is filtered out the first visible row is
    /// selected, which cascades like any other selection change.
    pub fn set_filter(&mut self, pane: Pane, query: String) -> Vec<Command> {
        let Some(slot) = pane.list_slot() else {
            return Vec::new();
        };
        if self.filters[slot] == query {
            return Vec::new();
        }
        self.filters[slot] = query;
        self.list_offsets[slot] = 0;
        if self.visible_selection(pane).is_some() {
            return Vec::new();
        }
        match self.visible_rows(pane).first() {
            Some(&index) => self.select_row(pane, index),
            None => Vec::new(),
        }
    }

    /// Width to render entries at
    pub fn render_width(&self) -> u16 {
        if self.content_width == 0 {
            DEFAULT_CONTENT_WIDTH
        } else {
            self.content_width
        }
    }

    /// Clamp selection indices to their lists.
    pub fn clamp_selections(&mut self) {
        self.selected_feed = self.selected_feed.min(self.feeds.len().saturating_sub(1));
        self.selected_entry = self.selected_entry.min(self.entries.len().saturating_sub(1));
    }

    // ------------------------------------------------------------------------
    // Selection cascade
    // ------------------------------------------------------------------------

    /// Select the feed at `index` and load its entries
    pub fn select_feed(&mut self, index: usize) -> Vec<Command> {
        if index >= self.feeds.len() || (index == self.selected_feed && self.current_feed.is_some()) {
            return Vec::new();
        }
        self.selected_feed = index;
        self.load_selected_feed()
    }

    /// Make the selected feed current: clear the entry pane and request its entries
    pub fn load_selected_feed(&mut self) -> Vec<Command> {
        self.entries.clear();
        self.selected_entry = 0;
        self.content = ContentState::Empty;
        self.scroll_offset = 0;
        self.visit_watermark = None;
        match self.selected_feed().map(|f| f.id) {
            Some(feed_id) => {
                self.current_feed = Some(feed_id);
                vec![Command::LoadEntries { feed_id }]
            }
            None => {
                self.current_feed = None;
                Vec::new()
            }
        }
    }

    /// Select the entry at `index` and render it
    pub fn select_entry(&mut self, index: usize) -> Vec<Command> {
        if index >= self.entries.len() {
            return Vec::new();
        }
        if index == self.selected_entry && self.content.entry_id() == self.selected_entry().map(|e| e.entry.id) {
            return Vec::new();
        }
        self.selected_entry = index;
        self.render_selected_entry()
    }

    /// Request a render of the selected entry, marking it read locally
    pub fn render_selected_entry(&mut self) -> Vec<Command> {
        let width = self.render_width();
        let Some(item) = self.entries.get_mut(self.selected_entry) else {
            self.content = ContentState::Empty;
            return Vec::new();
        };
        item.entry.read = true;
        self.content = ContentState::Loading {
            entry_id: item.entry.id,
        };
        self.scroll_offset = 0;
        vec![Command::RenderEntry {
            entry: item.entry.clone(),
            width,
        }]
    }

    /// Replace the feed list, keeping the selection on the same feed when it
    /// still exists.
    ///
    /// Returns true when the selected feed is no longer the one whose entries
    /// are shown, so the caller should cascade.
    pub fn replace_feeds(&mut self, feeds: Vec<Feed>) -> bool {
        let previous = self.selected_feed().map(|f| f.id);
        self.feeds = feeds;
        if let Some(index) = previous.and_then(|id| self.feeds.iter().position(|f| f.id == id)) {
            self.selected_feed = index;
        }
        self.clamp_selections();
        if self.visible_selection(Pane::Feeds).is_none() {
            if let Some(&index) = self.visible_rows(Pane::Feeds).first() {
                self.selected_feed = index;
            }
        }
        self.selected_feed().map(|f| f.id) != self.current_feed
    }

    /// Install the entries of the current feed.
    ///
    /// Every load advances the stored watermark, so a second load during the
    /// same visit reports a newer one. Entries are judged against the oldest
    /// watermark seen since the feed was selected.
    ///
    /// On a reload of the same list the selection follows the same entry.
    /// Returns true when the selected entry differs from the one displayed.
    pub fn replace_entries(&mut self, snapshot: FeedSnapshot) -> bool {
        let previous = self.selected_entry().map(|e| e.entry.id);
        let watermark = self
            .visit_watermark
            .map_or(snapshot.watermark, |seen| seen.min(snapshot.watermark));
        self.visit_watermark = Some(watermark);
        self.entries = snapshot
            .entries
            .into_iter()
            .map(|entry| EntryItem {
                unread: is_unread(&entry, watermark),
                entry,
            })
            .collect();
        self.selected_entry = previous
            .and_then(|id| self.entries.iter().position(|e| e.entry.id == id))
            .or_else(|| self.visible_rows(Pane::Entries).first().copied())
            .unwrap_or(0);
        self.clamp_selections();
        self.selected_entry().map(|e| e.entry.id) != self.content.entry_id()
    }

    // ------------------------------------------------------------------------
    // Reordering
    // ------------------------------------------------------------------------

    /// Send a reorder to storage, or queue it behind the one being written.
    ///
    /// Each plan is computed against the list as it looks after the moves
    /// before it, so they must land in the order they were made.
    pub fn queue_reorder(&mut self, plan: ReorderPlan) -> Vec<Command> {
        if self.reorder_in_flight {
            self.queued_reorders.push_back(plan);
            return Vec::new();
        }
        self.reorder_in_flight = true;
        vec![Command::Reorder { plan }]
    }

    /// The running reorder landed: start the next queued one
    pub fn reorder_finished(&mut self) -> Vec<Command> {
        match self.queued_reorders.pop_front() {
            Some(plan) => vec![Command::Reorder { plan }],
            None => {
                self.reorder_in_flight = false;
                Vec::new()
            }
        }
    }

    /// The running reorder failed. Queued moves were planned on top of it,
    /// so they are dropped too.
    pub fn reorder_failed(&mut self) {
        if !self.queued_reorders.is_empty() {
            tracing::debug!(dropped = self.queued_reorders.len(), "Dropping queued reorders");
        }
        self.queued_reorders.clear();
        self.reorder_in_flight = false;
    }

    /// A render request when the content pane width moved away from the
    /// width the shown entry was rendered at
    ///
    /// The recorded width is updated at once so one resize asks for one render.
    pub fn rerender_if_resized(&mut self) -> Option<Command> {
        let ContentState::Rendered { entry_id, width, .. } = &mut self.content else {
            return None;
        };
        if self.content_width == 0 || *width == self.content_width {
            return None;
        }
        *width = self.content_width;
        let entry = self
            .entries
            .iter()
            .find(|e| e.entry.id == *entry_id)?
            .entry
            .clone();
        Some(Command::RenderEntry {
            entry,
            width: self.content_width,
        })
    }

    // ------------------------------------------------------------------------
    // Content pane
    // ------------------------------------------------------------------------

    pub fn content_lines(&self) -> usize {
        match &self.content {
            ContentState::Rendered { content, .. } => content.lines.len(),
            _ => 1,
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
        self.clamp_scroll();
    }

    /// Keep the last line reachable but never scroll past it.
    pub fn clamp_scroll(&mut self) {
        let max_scroll = self.content_lines().saturating_sub(self.content_height.max(1));
        self.scroll_offset = self.scroll_offset.min(max_scroll).min(MAX_SCROLL);
    }

    /// Show a failure in the content pane and drop the loading indicator
    pub fn show_error(&mut self, error: impl Into<String>) {
        self.content = ContentState::Error(error.into());
        self.scroll_offset = 0;
        self.loading = false;
    }

    // ------------------------------------------------------------------------
    // Status bar
    // ------------------------------------------------------------------------

    pub fn sync_started(&mut self, feeds: usize) {
        self.pending_sync = self.pending_sync.saturating_add(feeds);
    }

    pub fn sync_progressed(&mut self) {
        self.pending_sync = self.pending_sync.saturating_sub(1);
    }

    /// Set status message (expires after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired. Returns true if one was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Middle section of the status bar
    pub fn status_text(&self) -> Option<Cow<'_, str>> {
        if self.loading {
            Some(Cow::Borrowed("Loading..."))
        } else if self.pending_sync > 0 {
            Some(Cow::Owned(format!("Syncing feeds... ({} remaining)", self.pending_sync)))
        } else {
            self.status_message
                .as_ref()
                .map(|(msg, _)| Cow::Borrowed(msg.as_ref()))
        }
    }
}

/// Case-insensitive substring match against the title as it is drawn.
/// `query` must already be lowercase.
fn title_matches(title: &str, query: &str) -> bool {
    query.is_empty() || strip_control_chars(title).to_lowercase().contains(query)
}

fn matching_rows<T>(rows: &[T], query: &str, title: impl Fn(&T) -> &str) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| title_matches(title(row), query))
        .map(|(i, _)| i)
        .collect()
}
