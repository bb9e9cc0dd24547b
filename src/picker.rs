//! File picker state for OPML import.
//!
//! Listing a directory is async (`list_dir`) and lands through an
//! `AppEvent`; the picker itself is plain state driven by the input handler.

use std::path::{Path, PathBuf};

/// Extensions the picker offers, compared case-insensitively
const IMPORT_EXTENSIONS: [&str; 2] = ["opml", "xml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// What Enter on the highlighted row means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerChoice {
    Descend(PathBuf),
    Select(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePicker {
    pub dir: PathBuf,
    pub entries: Vec<PickerEntry>,
    pub selected: usize,
    pub loading: bool,
    pub error: Option<String>,
}

impl FilePicker {
    /// A picker waiting for the listing of `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            entries: Vec::new(),
            selected: 0,
            loading: true,
            error: None,
        }
    }

    /// Start showing `dir`; the caller dispatches the listing
    pub fn navigate(&mut self, dir: PathBuf) {
        *self = Self::new(dir);
    }

    /// Apply a finished listing. Listings for a directory the user already
    /// left are ignored; returns whether it was applied.
    pub fn apply_listing(&mut self, dir: &Path, result: Result<Vec<PickerEntry>, String>) -> bool {
        if dir != self.dir {
            return false;
        }
        self.loading = false;
        self.selected = 0;
        match result {
            Ok(entries) => {
                self.entries = entries;
                self.error = None;
            }
            Err(e) => {
                self.entries.clear();
                self.error = Some(e);
            }
        }
        true
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select(&mut self, index: usize) {
        if index < self.entries.len() {
            self.selected = index;
        }
    }

    pub fn choose(&self) -> Option<PickerChoice> {
        let entry = self.entries.get(self.selected)?;
        Some(if entry.is_dir {
            PickerChoice::Descend(entry.path.clone())
        } else {
            PickerChoice::Select(entry.path.clone())
        })
    }

    pub fn parent(&self) -> Option<PathBuf> {
        self.dir.parent().map(Path::to_path_buf)
    }
}

fn is_import_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMPORT_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// List `dir` for the picker: a `..` row when there is a parent, then
/// directories, then `.opml`/`.xml` files, each group sorted by name.
/// Hidden entries are skipped.
pub async fn list_dir(dir: &Path) -> std::io::Result<Vec<PickerEntry>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut read = tokio::fs::read_dir(dir).await?;
    while let Some(item) = read.next_entry().await? {
        let name = item.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = item.path();
        // follows symlinks; dangling ones are skipped
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            continue;
        };
        if meta.is_dir() {
            dirs.push(PickerEntry { name, path, is_dir: true });
        } else if meta.is_file() && is_import_candidate(&path) {
            files.push(PickerEntry { name, path, is_dir: false });
        }
    }

    dirs.sort_by_cached_key(|e| e.name.to_lowercase());
    files.sort_by_cached_key(|e| e.name.to_lowercase());

    let mut entries = Vec::with_capacity(dirs.len() + files.len() + 1);
    if let Some(parent) = dir.parent() {
        entries.push(PickerEntry {
            name: "..".to_string(),
            path: parent.to_path_buf(),
            is_dir: true,
        });
    }
    entries.extend(dirs);
    entries.extend(files);
    Ok(entries)
}
