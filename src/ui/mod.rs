//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Key and mouse transitions
//! - `events` - Background task event processing
//! - `commands` - Spawns the task behind each `Command`
//! - `render` - Layout and overlay dispatch
//! - `helpers` - Panic capture and channel sends for tasks
//! - `lists` - Feed and entry list panes
//! - `content` - Content pane with OSC 8 links
//! - `status` - Status bar widget
//! - `help` - Keybinding overlay
//! - `dialogs` - Add-feed prompt and import picker

mod commands;
mod content;
mod dialogs;
mod events;
mod help;
mod helpers;
mod input;
mod lists;
mod loop_runner;
mod render;
mod status;

// Re-export the public API
pub use loop_runner::{run, Action};
