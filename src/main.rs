use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use lazyrss::app::{App, AppEvent, Command};
use lazyrss::config::Config;
use lazyrss::keybindings::KeybindingRegistry;
use lazyrss::storage::{Database, DatabaseError};
use lazyrss::ui;

/// Get the config directory path (~/.config/lazyrss/)
fn get_config_dir(home: &Path) -> PathBuf {
    home.join(".config").join("lazyrss")
}

/// Create the config directory with user-only permissions
fn init_config_dir(config_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create config directory {}", config_dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(config_dir, std::fs::Permissions::from_mode(0o700)).with_context(|| {
            format!(
                "Failed to set permissions on config directory {}",
                config_dir.display()
            )
        })?;
    }

    Ok(())
}

/// Log to a file in the config directory; stdout belongs to the TUI.
fn init_logging(config_dir: &Path) -> Result<()> {
    let log_path = config_dir.join("lazyrss.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Print a startup error and exit with status 1
fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

#[derive(Parser, Debug)]
#[command(
    name = "lazyrss",
    version,
    about = "A terminal RSS and Atom reader",
    long_about = "A terminal RSS and Atom reader.\n\n\
                  Settings live in ~/.config/lazyrss/config.toml. Press ? inside the app for keys."
)]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    let _args = Args::parse();

    let home = match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home),
        None => fail("HOME environment variable not set"),
    };

    let config_dir = get_config_dir(&home);
    if let Err(e) = init_config_dir(&config_dir) {
        fail(format!("{:#}", e));
    }
    if let Err(e) = init_logging(&config_dir) {
        fail(format!("{:#}", e));
    }

    let config = match Config::load(&config_dir.join("config.toml")) {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    let db_path = config_dir.join("lazyrss.db");
    let Some(db_path_str) = db_path.to_str() else {
        fail("Invalid UTF-8 in database path");
    };
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => fail(DatabaseError::InstanceLocked),
        Err(e) => fail(format!("Failed to open database: {}", e)),
    };

    let mut keybindings = KeybindingRegistry::new();
    let warnings = keybindings.apply_overrides(&config.keybindings);
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Keybinding override ignored");
    }

    let mut app = App::new(db, keybindings, &config, &home).context("Failed to create application")?;
    if !warnings.is_empty() {
        app.set_status(format!(
            "{} keybinding override(s) ignored, see lazyrss.log",
            warnings.len()
        ));
    }

    let mut initial = vec![Command::LoadFeeds];
    if config.sync.on_startup {
        initial.push(Command::SyncAll);
    }

    // Create event channel for background tasks
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    tracing::info!(db = %db_path.display(), "Starting lazyrss");
    ui::run(&mut app, initial, event_tx, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}
