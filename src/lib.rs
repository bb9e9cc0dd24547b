//! lazyrss: a terminal RSS/Atom reader.
//!
//! The binary in `main.rs` wires these modules together; integration tests
//! use them directly.

pub mod app;
pub mod config;
pub mod feed;
pub mod keybindings;
pub mod ordering;
pub mod picker;
pub mod render;
pub mod storage;
pub mod ui;
pub mod util;
