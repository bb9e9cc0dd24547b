//! Keybinding registry: maps key events to actions, with config overrides.
//!
//! Only the main three-pane view dispatches through the registry. Modal
//! prompts (add feed, file picker, list filter, help) read keys directly
//! since their keys are fixed text-editing and navigation keys.
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

// ============================================================================
// Action Enum
// ============================================================================

/// All user-facing actions that can be triggered by keybindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    NavDown,
    NavUp,
    NextPane,
    PrevPane,
    OpenLink,
    SyncAll,
    RefreshFeed,
    ExportOpml,
    AddFeed,
    ImportOpml,
    DeleteFeed,
    MoveFeedUp,
    MoveFeedDown,
    StartFilter,
    ClearFilter,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    ShowHelp,
}

impl Action {
    /// Human-readable description for the help screen.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Quit => "Quit application",
            Self::NavDown => "Select next",
            Self::NavUp => "Select previous",
            Self::NextPane => "Focus next pane",
            Self::PrevPane => "Focus previous pane",
            Self::OpenLink => "Open link in browser",
            Self::SyncAll => "Sync all feeds",
            Self::RefreshFeed => "Refresh current feed",
            Self::ExportOpml => "Export feeds to OPML",
            Self::AddFeed => "Add feed by URL",
            Self::ImportOpml => "Import feeds from OPML",
            Self::DeleteFeed => "Delete feed",
            Self::MoveFeedUp => "Move feed up",
            Self::MoveFeedDown => "Move feed down",
            Self::StartFilter => "Filter list by title",
            Self::ClearFilter => "Clear list filter",
            Self::ScrollDown => "Scroll down one line",
            Self::ScrollUp => "Scroll up one line",
            Self::PageDown => "Page down",
            Self::PageUp => "Page up",
            Self::ShowHelp => "Show help",
        }
    }
}

// ============================================================================
// Context Enum
// ============================================================================

/// Dispatch context: the focused pane, with Global as the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Global,
    Feeds,
    Entries,
    Content,
}

impl Context {
    pub fn label(self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Feeds => "Feeds",
            Self::Entries => "Entries",
            Self::Content => "Content",
        }
    }
}

// ============================================================================
// Key Specification
// ============================================================================

/// A key event: code + modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    pub const fn alt(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::ALT)
    }

    /// Terminals report SHIFT alongside uppercase letters, symbols and
    /// BackTab; the character itself already carries that information.
    fn normalized(code: KeyCode, modifiers: KeyModifiers) -> Self {
        let modifiers = match code {
            KeyCode::Char(_) | KeyCode::BackTab => modifiers.difference(KeyModifiers::SHIFT),
            _ => modifiers,
        };
        Self::new(code, modifiers)
    }
}

fn parse_named_key(s: &str) -> Option<KeyCode> {
    let code = match s.to_lowercase().as_str() {
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backtab" | "shift+tab" => KeyCode::BackTab,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "backspace" => KeyCode::Backspace,
        "space" => KeyCode::Char(' '),
        _ => {
            let mut chars = s.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Some(KeyCode::Char(c)),
                (Some('F' | 'f'), Some(_)) => match s[1..].parse::<u8>() {
                    Ok(n) if (1..=12).contains(&n) => Some(KeyCode::F(n)),
                    _ => None,
                },
                _ => None,
            };
        }
    };
    Some(code)
}

/// Parse a key string from config into a KeySpec.
///
/// Supported formats:
/// - Single char: "q", "j", "/"
/// - Named keys: "Enter", "Esc", "Tab", "BackTab", "Up", "PageDown", ...
/// - Modifier combos: "Ctrl+d", "Alt+Up", "Alt+j"
/// - Function keys: "F1" through "F12"
fn parse_key_string(s: &str) -> Option<KeySpec> {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix("Ctrl+") {
        return match parse_named_key(rest.trim())? {
            KeyCode::Char(c) => Some(KeySpec::ctrl(c)),
            _ => None,
        };
    }
    if let Some(rest) = s.strip_prefix("Alt+") {
        return parse_named_key(rest.trim()).map(KeySpec::alt);
    }

    parse_named_key(s).map(KeySpec::plain)
}

/// Format a KeySpec as a human-readable string for the help screen.
fn format_key(key: &KeySpec) -> String {
    let mut out = String::new();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        out.push_str("Ctrl+");
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        out.push_str("Alt+");
    }

    match key.code {
        KeyCode::Char(' ') => out.push_str("Space"),
        KeyCode::Char(c) => out.push(c),
        KeyCode::Enter => out.push_str("Enter"),
        KeyCode::Esc => out.push_str("Esc"),
        KeyCode::Tab => out.push_str("Tab"),
        KeyCode::BackTab => out.push_str("Shift+Tab"),
        KeyCode::Up => out.push_str("Up"),
        KeyCode::Down => out.push_str("Down"),
        KeyCode::Left => out.push_str("Left"),
        KeyCode::Right => out.push_str("Right"),
        KeyCode::PageUp => out.push_str("PageUp"),
        KeyCode::PageDown => out.push_str("PageDown"),
        KeyCode::Home => out.push_str("Home"),
        KeyCode::End => out.push_str("End"),
        KeyCode::Backspace => out.push_str("Backspace"),
        KeyCode::F(n) => out.push_str(&format!("F{}", n)),
        _ => out.push('?'),
    }

    out
}

// ============================================================================
// Keybinding Registry
// ============================================================================

/// Registry of keybindings, supporting default bindings and config overrides.
///
/// The same key can map to different actions in different contexts: `j`
/// selects the next row in the lists but scrolls in the content pane.
pub struct KeybindingRegistry {
    lookup: HashMap<(Context, KeySpec), Action>,
    /// All bindings in registration order, for the help screen
    bindings: Vec<(Context, KeySpec, Action)>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            lookup: HashMap::new(),
            bindings: Vec::new(),
        };
        registry.register_defaults();
        registry
    }

    fn bind(&mut self, context: Context, key: KeySpec, action: Action) {
        self.lookup.insert((context, key), action);
        self.bindings.push((context, key, action));
    }

    fn bind_all(&mut self, context: Context, keys: &[KeySpec], action: Action) {
        for &key in keys {
            self.bind(context, key, action);
        }
    }

    fn register_defaults(&mut self) {
        use Context::*;
        use KeyCode::*;
        let p = KeySpec::plain;

        // === Global ===
        self.bind(Global, p(Char('q')), Action::Quit);
        self.bind_all(Global, &[p(Char('j')), p(Down)], Action::NavDown);
        self.bind_all(Global, &[p(Char('k')), p(Up)], Action::NavUp);
        self.bind_all(Global, &[p(Tab), p(Right)], Action::NextPane);
        self.bind_all(Global, &[p(BackTab), p(Left)], Action::PrevPane);
        self.bind_all(Global, &[p(Enter), p(Char('o'))], Action::OpenLink);
        self.bind(Global, p(Char('r')), Action::SyncAll);
        self.bind(Global, p(Char('e')), Action::ExportOpml);
        self.bind(Global, p(Char('a')), Action::AddFeed);
        self.bind(Global, p(Char('i')), Action::ImportOpml);
        self.bind(Global, p(Char('?')), Action::ShowHelp);

        // === Feeds pane ===
        self.bind(Feeds, p(Char('d')), Action::DeleteFeed);
        self.bind_all(Feeds, &[KeySpec::alt(Up), KeySpec::alt(Char('k'))], Action::MoveFeedUp);
        self.bind_all(
            Feeds,
            &[KeySpec::alt(Down), KeySpec::alt(Char('j'))],
            Action::MoveFeedDown,
        );

        // === Entries pane ===
        self.bind(Entries, p(Char('r')), Action::RefreshFeed);

        // === Both lists ===
        for ctx in [Feeds, Entries] {
            self.bind(ctx, p(Char('/')), Action::StartFilter);
            self.bind(ctx, p(Esc), Action::ClearFilter);
        }

        // === Content pane ===
        self.bind_all(Content, &[p(Char('j')), p(Down)], Action::ScrollDown);
        self.bind_all(Content, &[p(Char('k')), p(Up)], Action::ScrollUp);
        self.bind_all(Content, &[p(PageDown), KeySpec::ctrl('d')], Action::PageDown);
        self.bind_all(Content, &[p(PageUp), KeySpec::ctrl('u')], Action::PageUp);
    }

    /// Apply user overrides from config keybindings map.
    ///
    /// Keys in the map are action names (e.g., "quit", "sync_all").
    /// Values are key strings (e.g., "q", "Ctrl+d", "F5"). An override
    /// replaces every default key of that action, in the same contexts.
    ///
    /// Returns a list of warnings for unrecognized action names or unparseable keys.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Vec<String> {
        let mut warnings = Vec::new();

        for (action_name, key_str) in overrides {
            let Some(action) = parse_action_name(action_name) else {
                warnings.push(format!("Unknown action '{}', ignoring", action_name));
                continue;
            };
            let Some(key) = parse_key_string(key_str) else {
                warnings.push(format!(
                    "Cannot parse key '{}' for action '{}', ignoring",
                    key_str, action_name
                ));
                continue;
            };

            let mut contexts: Vec<Context> = self
                .bindings
                .iter()
                .filter(|(_, _, a)| *a == action)
                .map(|(c, _, _)| *c)
                .collect();
            contexts.dedup();

            self.lookup.retain(|_, a| *a != action);
            self.bindings.retain(|(_, _, a)| *a != action);
            for ctx in contexts {
                self.bind(ctx, key, action);
            }

            tracing::info!(action = %action_name, key = %key_str, "Applied keybinding override");
        }

        warnings
    }

    /// Look up the action for a key in a context, falling back to Global.
    pub fn action_for_key(&self, code: KeyCode, modifiers: KeyModifiers, context: Context) -> Option<Action> {
        let key = KeySpec::normalized(code, modifiers);

        self.lookup
            .get(&(context, key))
            .or_else(|| self.lookup.get(&(Context::Global, key)))
            .copied()
    }

    /// Get all bindings for the help screen.
    ///
    /// Returns (context, key_display_string, action, description) tuples.
    pub fn all_bindings(&self) -> Vec<(Context, String, Action, &'static str)> {
        self.bindings
            .iter()
            .map(|(ctx, key, action)| (*ctx, format_key(key), *action, action.describe()))
            .collect()
    }
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an action name string (from config) into an Action enum.
fn parse_action_name(name: &str) -> Option<Action> {
    let action = match name.to_lowercase().replace('-', "_").as_str() {
        "quit" => Action::Quit,
        "nav_down" | "down" => Action::NavDown,
        "nav_up" | "up" => Action::NavUp,
        "next_pane" => Action::NextPane,
        "prev_pane" | "previous_pane" => Action::PrevPane,
        "open_link" | "open" => Action::OpenLink,
        "sync_all" | "sync" | "refresh_all" => Action::SyncAll,
        "refresh_feed" | "refresh_one" => Action::RefreshFeed,
        "export_opml" | "export" => Action::ExportOpml,
        "add_feed" | "add" => Action::AddFeed,
        "import_opml" | "import" => Action::ImportOpml,
        "delete_feed" | "delete" => Action::DeleteFeed,
        "move_feed_up" => Action::MoveFeedUp,
        "move_feed_down" => Action::MoveFeedDown,
        "start_filter" | "filter" => Action::StartFilter,
        "clear_filter" => Action::ClearFilter,
        "scroll_down" => Action::ScrollDown,
        "scroll_up" => Action::ScrollUp,
        "page_down" => Action::PageDown,
        "page_up" => Action::PageUp,
        "show_help" | "help" => Action::ShowHelp,
        _ => return None,
    };
    Some(action)
}

// ============================================================================
// Tests
// ============================================================================
