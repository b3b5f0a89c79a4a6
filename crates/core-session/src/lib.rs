//! Document/session accessor boundary.
//!
//! The plugin host never owns the document model; it delegates every content,
//! selection, cursor, file, and theme access to the embedding application
//! through the [`DocumentSession`] trait defined here. The trait is the only
//! surface the host knows about, so any host application (terminal frontend,
//! GUI shell, test harness) can plug in by implementing it.
//!
//! [`MemorySession`] is the reference implementation used by the test suites
//! and by embedders that want a self-contained session (scratch buffers,
//! previews). It also records transient messages so tests can assert on
//! user-facing notifications without a rendering layer.
//!
//! Formatter registration lives here rather than in the plugin host because
//! reformatting is a document-model concern: the host merely forwards a
//! plugin's formatter to the session and revokes it on disable.

use std::fmt;
use std::rc::Rc;

/// Half-open byte-offset range `[start, end)` within the document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    /// Construct a range normalizing ordering so that `start <= end`.
    pub fn new(mut a: usize, mut b: usize) -> Self {
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        Self { start: a, end: b }
    }

    /// Collapsed range at a single offset.
    pub fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Cursor position as zero-based line and column (bytes within the line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPos {
    pub line: usize,
    pub column: usize,
}

impl CursorPos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// File metadata for the active document. `language` is a lowercase
/// identifier such as `"rust"` or `"markdown"`; the host treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub language: String,
}

impl FileInfo {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            language: language.into(),
        }
    }
}

/// Severity of a transient user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLevel::Info => write!(f, "info"),
            MessageLevel::Warn => write!(f, "warn"),
            MessageLevel::Error => write!(f, "error"),
        }
    }
}

/// A reformatting routine registered with the session. `apply` receives the
/// full document content and returns the reformatted text.
#[derive(Clone)]
pub struct Formatter {
    pub id: String,
    pub apply: Rc<dyn Fn(&str) -> String>,
}

impl Formatter {
    pub fn new(id: impl Into<String>, apply: impl Fn(&str) -> String + 'static) -> Self {
        Self {
            id: id.into(),
            apply: Rc::new(apply),
        }
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter").field("id", &self.id).finish()
    }
}

/// Abstract document/session accessor supplied by the host application.
///
/// All operations are infallible by contract: the session is expected to
/// clamp or ignore out-of-range inputs rather than fail, mirroring how an
/// editor buffer tolerates a stale cursor after an edit.
pub trait DocumentSession {
    fn content(&self) -> String;
    fn set_content(&mut self, text: &str);

    fn selection(&self) -> SelectionRange;
    fn set_selection(&mut self, selection: SelectionRange);

    fn cursor(&self) -> CursorPos;
    fn set_cursor(&mut self, cursor: CursorPos);

    fn file_info(&self) -> FileInfo;
    fn set_language(&mut self, language: &str);

    fn theme(&self) -> String;
    fn set_theme(&mut self, theme: &str);

    /// Generic state snapshot for ad-hoc reads by plugins. The shape is
    /// session-defined; `MemorySession` exposes content length, selection,
    /// cursor, file and theme.
    fn state_value(&self) -> serde_json::Value;

    /// Show a transient user-facing message (toast/status line). Delegated,
    /// not rendered, by the plugin host.
    fn show_message(&mut self, level: MessageLevel, text: &str);

    fn register_formatter(&mut self, formatter: Formatter);
    /// Returns `true` when a formatter with that id was present.
    fn unregister_formatter(&mut self, id: &str) -> bool;
}

/// Byte offset of a line/column cursor within `content`. Lines past the end
/// clamp to the final offset; columns clamp to the line length (excluding the
/// trailing newline).
pub fn byte_offset_at(content: &str, cursor: CursorPos) -> usize {
    let mut offset = 0usize;
    for (idx, line) in content.split('\n').enumerate() {
        if idx == cursor.line {
            return offset + cursor.column.min(line.len());
        }
        // +1 for the newline separator consumed by split.
        offset += line.len() + 1;
    }
    content.len()
}

/// In-memory [`DocumentSession`] used by tests and self-contained embedders.
///
/// Messages shown through [`DocumentSession::show_message`] are recorded in
/// `messages` so callers can assert on them.
#[derive(Debug, Default)]
pub struct MemorySession {
    content: String,
    selection: SelectionRange,
    cursor: CursorPos,
    file: FileInfo,
    theme: String,
    formatters: Vec<Formatter>,
    pub messages: Vec<(MessageLevel, String)>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(file: FileInfo) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn formatters(&self) -> &[Formatter] {
        &self.formatters
    }

    /// Run a registered formatter over the current content, replacing it.
    /// Returns `false` when no formatter with that id exists.
    pub fn format_with(&mut self, id: &str) -> bool {
        let Some(formatter) = self.formatters.iter().find(|f| f.id == id) else {
            return false;
        };
        let apply = formatter.apply.clone();
        self.content = (*apply)(&self.content);
        true
    }
}

impl DocumentSession for MemorySession {
    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, text: &str) {
        self.content = text.to_string();
        // Clamp stale positions rather than carrying them past the new end.
        let len = self.content.len();
        self.selection = SelectionRange::new(self.selection.start.min(len), self.selection.end.min(len));
    }

    fn selection(&self) -> SelectionRange {
        self.selection
    }

    fn set_selection(&mut self, selection: SelectionRange) {
        let len = self.content.len();
        self.selection = SelectionRange::new(selection.start.min(len), selection.end.min(len));
    }

    fn cursor(&self) -> CursorPos {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: CursorPos) {
        self.cursor = cursor;
    }

    fn file_info(&self) -> FileInfo {
        self.file.clone()
    }

    fn set_language(&mut self, language: &str) {
        self.file.language = language.to_string();
    }

    fn theme(&self) -> String {
        self.theme.clone()
    }

    fn set_theme(&mut self, theme: &str) {
        self.theme = theme.to_string();
    }

    fn state_value(&self) -> serde_json::Value {
        serde_json::json!({
            "content_len": self.content.len(),
            "selection": { "start": self.selection.start, "end": self.selection.end },
            "cursor": { "line": self.cursor.line, "column": self.cursor.column },
            "file": {
                "name": self.file.name,
                "path": self.file.path,
                "language": self.file.language,
            },
            "theme": self.theme,
        })
    }

    fn show_message(&mut self, level: MessageLevel, text: &str) {
        tracing::debug!(target: "plugin.session", level = %level, text, "message_shown");
        self.messages.push((level, text.to_string()));
    }

    fn register_formatter(&mut self, formatter: Formatter) {
        if let Some(existing) = self.formatters.iter_mut().find(|f| f.id == formatter.id) {
            *existing = formatter;
        } else {
            self.formatters.push(formatter);
        }
    }

    fn unregister_formatter(&mut self, id: &str) -> bool {
        let before = self.formatters.len();
        self.formatters.retain(|f| f.id != id);
        self.formatters.len() != before
    }
}
