//! Main event loop for the TUI.
//!
//! This module contains the core event loop that multiplexes terminal input,
//! background task events, and periodic ticks.

use crate::app::{App, AppEvent, Command};
use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::commands::dispatch;
use super::events::handle_app_event;
use super::input::{handle_key, handle_mouse};
use super::render::render;

/// Result of handling a key press event.
pub enum Action {
    /// Keep running and dispatch these commands.
    Continue(Vec<Command>),
    /// Exit the application and restore the terminal.
    Quit,
}

/// Runs the TUI application event loop.
///
/// Uses `tokio::select!` to multiplex three event sources:
/// - **Terminal input**: keys, mouse and resize from crossterm's event stream
/// - **Background tasks**: `AppEvent`s from dispatched commands
/// - **Periodic tick**: 250ms timer for status expiry
///
/// `initial` commands are dispatched before the first frame.
///
/// # Panic Safety
///
/// Installs a panic hook that restores terminal state before unwinding,
/// ensuring the terminal is not left in raw mode on panic.
pub async fn run(
    app: &mut App,
    initial: Vec<Command>,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    // Install panic hook BEFORE setting up terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut event_stream = crossterm::event::EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    // Signal handlers for graceful shutdown (Unix only)
    // On non-Unix platforms, these become pending futures that never complete
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    run_commands(app, initial, &event_tx);

    loop {
        // Only render when state has changed
        if app.needs_redraw {
            terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;

            // the frame reports the content width; re-render on change
            if let Some(command) = app.rerender_if_resized() {
                dispatch(app, command, &event_tx);
            }
        }

        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Drain pending app events before waiting on input so task results
        // are not starved by fast typing.
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            let commands = handle_app_event(app, event);
            run_commands(app, commands, &event_tx);
        }

        // Platform-specific signal futures
        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;  // Process in order listed for predictable behavior

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                        app.needs_redraw = true;
                        match handle_key(app, key.code, key.modifiers) {
                            Action::Quit => break,
                            Action::Continue(commands) => run_commands(app, commands, &event_tx),
                        }
                    }
                    Some(Ok(Event::Mouse(mouse))) => {
                        let commands = handle_mouse(app, mouse);
                        app.needs_redraw = true;
                        run_commands(app, commands, &event_tx);
                    }
                    Some(Ok(Event::Resize(_, _))) => {
                        app.needs_redraw = true;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Terminal event stream error");
                    }
                    _ => {}
                }
            }

            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                let commands = handle_app_event(app, event);
                run_commands(app, commands, &event_tx);
            }

            _ = tick_interval.tick() => {}
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

fn run_commands(app: &App, commands: Vec<Command>, event_tx: &mpsc::Sender<AppEvent>) {
    for command in commands {
        dispatch(app, command, event_tx);
    }
}

/// Set up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state.
fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
