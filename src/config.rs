//! Configuration file parser for ~/.config/lazyrss/config.toml.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted but logged, since they are
//! usually typos.
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Background synchronization settings (`[sync]` table)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-feed fetch timeout, retries included
    pub timeout_secs: u64,
    /// Maximum feeds fetched at once
    pub concurrency: usize,
    /// Sync every feed right after launch
    pub on_startup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            concurrency: 10,
            on_startup: true,
        }
    }
}

/// Top-level application configuration.
///
/// Every field has a default so any subset of keys can be specified.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,

    /// Where `e` writes the OPML export. Defaults to ~/Downloads/feeds_export.opml
    pub export_path: Option<PathBuf>,

    /// Directory the import picker opens in. Defaults to the home directory
    pub import_dir: Option<PathBuf>,

    /// Custom keybinding overrides. Keys are action names, values are key strings.
    pub keybindings: HashMap<String, String>,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 4] = ["sync", "export_path", "import_dir", "keybindings"];
    const KNOWN_SYNC_KEYS: [&'static str; 3] = ["timeout_secs", "concurrency", "on_startup"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            timeout_secs = config.sync.timeout_secs,
            concurrency = config.sync.concurrency,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn export_path(&self, home: &Path) -> PathBuf {
        match &self.export_path {
            Some(path) => expand_home(path, home),
            None => home.join("Downloads").join("feeds_export.opml"),
        }
    }

    pub fn import_dir(&self, home: &Path) -> PathBuf {
        match &self.import_dir {
            Some(path) => expand_home(path, home),
            None => home.to_path_buf(),
        }
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !Config::KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    if let Some(toml::Value::Table(sync)) = raw.get("sync") {
        for key in sync.keys() {
            if !Config::KNOWN_SYNC_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in [sync], ignoring");
            }
        }
    }
}

/// Resolve a leading `~` against the home directory
fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("lazyrss_config_test_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sync, SyncConfig { timeout_secs: 10, concurrency: 10, on_startup: true });
        assert!(config.export_path.is_none());
        assert!(config.keybindings.is_empty());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let config = Config::load(Path::new("/tmp/lazyrss_test_nonexistent_config.toml")).unwrap();
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sync, SyncConfig::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_sync_table_uses_defaults() {
        let (dir, path) = write_config("partial", "[sync]\ntimeout_secs = 30\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sync.timeout_secs, 30);
        assert_eq!(config.sync.concurrency, 10);
        assert!(config.sync.on_startup);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
export_path = "~/backups/feeds.opml"
import_dir = "/srv/opml"

[sync]
timeout_secs = 5
concurrency = 4
on_startup = false

[keybindings]
quit = "Ctrl+q"
sync_all = "F5"
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();
        let home = Path::new("/home/reader");

        assert_eq!(config.sync, SyncConfig { timeout_secs: 5, concurrency: 4, on_startup: false });
        assert_eq!(config.export_path(home), PathBuf::from("/home/reader/backups/feeds.opml"));
        assert_eq!(config.import_dir(home), PathBuf::from("/srv/opml"));
        assert_eq!(config.keybindings.get("sync_all").map(String::as_str), Some("F5"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_paths_resolve_under_home() {
        let config = Config::default();
        let home = Path::new("/home/reader");
        assert_eq!(
            config.export_path(home),
            PathBuf::from("/home/reader/Downloads/feeds_export.opml")
        );
        assert_eq!(config.import_dir(home), PathBuf::from("/home/reader"));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "totally_fake_key = 1\n[sync]\nbogus = true\n");
        assert!(Config::load(&path).is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "[sync]\ntimeout_secs = \"ten\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
