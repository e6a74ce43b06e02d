//! Log adapter: turns the raw execution trace into incrementally rendered,
//! colour-annotated UI output.
//!
//! # Pipeline
//!
//! ```text
//! raw chunk
//!     |
//!     v
//! strip_ansi --> extract_task_marker --> UiSurface::toast("🤖 ...")
//!     |
//!     v
//! highlight (advance colour on chain entry, then wrap literals)
//!     |
//!     v
//! pending buffer --(raw chunk had '\n')--> UiSurface::render(block)
//! ```
//!
//! Highlighting is one pass of literal matching over a single chunk, longest
//! literal first, so overlapping role names never nest. A marker or role name
//! split across two chunks is left unhighlighted.

pub mod markup;

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::trace::{CHAIN_ENTERED, CHAIN_FINISHED, TraceSink};

/// Glyph prefixed to every task notification.
pub const ROBOT_GLYPH: &str = "🤖";

/// Role names highlighted by default (the launch crew's roster).
pub const DEFAULT_ROLES: [&str; 3] = [
    "Market Research Analyst",
    "Business Development Consultant",
    "Technology Expert",
];

/// A colour token used in highlight markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Blue,
    Orange,
}

impl Color {
    pub fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Orange => "orange",
        }
    }

    /// Parse a colour token as it appears in markup.
    pub fn from_token(token: &str) -> Option<Self> {
        PALETTE.iter().copied().find(|c| c.as_str() == token)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cyclic palette the colour cursor walks.
pub const PALETTE: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Orange];

/// Destination for adapter output.
pub trait UiSurface: Send {
    /// Receive one flushed block of markup. Surfaces display the cumulative
    /// log of the run, so each call replaces the previous view with all
    /// blocks received so far.
    fn render(&mut self, block: &str);

    /// Show a short-lived notification.
    fn toast(&mut self, message: &str);
}

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1B\[[0-9;]*[mK]").expect("valid ANSI regex"))
}

fn task_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)"task"\s*:\s*"(.*?)""#).expect("valid task regex"))
}

fn task_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)task\s*:\s*([^\n]*)").expect("valid task regex"))
}

/// Remove ANSI CSI colour and erase-line sequences (`ESC [ params m|K`).
pub fn strip_ansi(text: &str) -> String {
    ansi_re().replace_all(text, "").into_owned()
}

/// Find a task description in a cleaned chunk.
///
/// A quoted `"task": "..."` pair wins over a bare `task: ...` line even when
/// both are present. The bare form yields the rest of its line, trimmed.
pub fn extract_task_marker(text: &str) -> Option<String> {
    if let Some(caps) = task_object_re().captures(text) {
        return Some(caps[1].to_string());
    }
    task_input_re()
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

/// One alternation over the role names and chain markers.
///
/// Literals are ordered longest first, so the leftmost match is also the
/// longest one starting there.
fn literal_re<'a>(roles: impl IntoIterator<Item = &'a str>) -> Option<Regex> {
    let mut literals: Vec<&str> = roles.into_iter().filter(|r| !r.is_empty()).collect();
    literals.extend([CHAIN_ENTERED, CHAIN_FINISHED]);
    literals.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    literals.dedup();

    let pattern = literals
        .iter()
        .map(|l| regex::escape(l))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "role highlighting disabled");
            None
        }
    }
}

/// Wrap `text` in highlight markup.
pub fn highlight(text: &str, color: Color) -> String {
    format!(":{color}[{text}]")
}

/// Streams trace chunks into a [`UiSurface`].
pub struct LogAdapter<S> {
    surface: S,
    literals: Option<Regex>,
    pending: Vec<String>,
    color_index: usize,
}

impl<S: UiSurface> LogAdapter<S> {
    /// Create an adapter highlighting [`DEFAULT_ROLES`].
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            literals: literal_re(DEFAULT_ROLES),
            pending: Vec::new(),
            color_index: 0,
        }
    }

    /// Replace the role names to highlight (e.g. for a custom crew file).
    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        self.literals = literal_re(roles.iter().map(String::as_str));
        self
    }

    /// Process one raw chunk of trace text.
    pub fn ingest(&mut self, chunk: &str) {
        let cleaned = strip_ansi(chunk);

        match extract_task_marker(&cleaned) {
            Some(task) if !task.is_empty() => {
                self.surface.toast(&format!("{ROBOT_GLYPH} {task}"));
            }
            _ => {}
        }

        let processed = self.apply_highlights(cleaned);
        self.pending.push(processed);

        if chunk.contains('\n') {
            self.flush_pending();
        }
    }

    /// Render whatever is buffered, even without a trailing newline.
    pub fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let block = self.pending.concat();
        self.pending.clear();
        self.surface.render(&block);
    }

    fn apply_highlights(&mut self, text: String) -> String {
        if text.contains(CHAIN_ENTERED) {
            self.color_index = (self.color_index + 1) % PALETTE.len();
        }

        let color = self.current_color();
        let Some(re) = &self.literals else {
            return text;
        };
        re.replace_all(&text, |caps: &Captures<'_>| highlight(&caps[0], color))
            .into_owned()
    }

    /// Number of chunks waiting for a line boundary.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Current position of the colour cursor in [`PALETTE`].
    pub fn color_index(&self) -> usize {
        self.color_index
    }

    pub fn current_color(&self) -> Color {
        PALETTE[self.color_index]
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

impl<S: UiSurface> TraceSink for LogAdapter<S> {
    fn write_chunk(&mut self, chunk: &str) {
        self.ingest(chunk);
    }
}
