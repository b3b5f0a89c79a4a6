//! Owned editor resources and their stores.
//!
//! Every contribution a plugin pushes into the host (inline decoration,
//! gutter decoration, code lens, inline annotation, diagnostic) is an *owned
//! resource*: it carries a [`ResourceId`] naming both the owning plugin and a
//! local identifier. Ownership is structural, not a string-prefix convention:
//! clear-by-owner compares the `owner` field and cannot be confused by a
//! local id that happens to contain `:`. The rendered form `owner:local`
//! (via `Display`) and [`ResourceId::parse`] keep the external string shape
//! unchanged for anything that logs or round-trips identifiers.
//!
//! [`ResourceStore`] is a neutral, order-preserving container: it imposes no
//! sorting or deduplication policy. Merging is upsert-by-identifier so a
//! plugin can refresh its own contributions wholesale without tracking what
//! it previously emitted.

use std::fmt;

/// Separator between the owner and local components in the rendered form.
pub const OWNER_SEP: char = ':';

/// Structured resource identifier: owning plugin id plus a plugin-local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    owner: String,
    local: String,
}

impl ResourceId {
    pub fn new(owner: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            local: local.into(),
        }
    }

    /// Parse the rendered `owner:local` form. The first separator splits;
    /// the local part may itself contain further separators.
    pub fn parse(s: &str) -> Option<Self> {
        let (owner, local) = s.split_once(OWNER_SEP)?;
        if owner.is_empty() {
            return None;
        }
        Some(Self::new(owner, local))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// Same id under a different owner. Used by the capability facade to
    /// retag resources submitted with a foreign or malformed owner.
    pub fn rehomed(&self, owner: &str) -> Self {
        Self::new(owner, self.local.clone())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, OWNER_SEP, self.local)
    }
}

/// Implemented by every stored resource kind so [`ResourceStore`] can key
/// merge/remove/clear operations off the identifier.
pub trait OwnedResource {
    fn id(&self) -> &ResourceId;
}

/// Half-open byte-offset range `[start, end)` targeted by a decoration or a
/// diagnostic span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Inline text decoration over a byte range: a style class resolved by the
/// rendering layer, plus optional hover text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDecoration {
    pub id: ResourceId,
    pub range: TextRange,
    pub class: String,
    pub hover: Option<String>,
}

impl InlineDecoration {
    pub fn new(id: ResourceId, range: TextRange, class: impl Into<String>) -> Self {
        Self {
            id,
            range,
            class: class.into(),
            hover: None,
        }
    }

    pub fn with_hover(mut self, hover: impl Into<String>) -> Self {
        self.hover = Some(hover.into());
        self
    }
}

impl OwnedResource for InlineDecoration {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// Gutter decoration on a zero-based line: an icon name plus optional
/// tooltip, and an optional command id invoked on click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GutterDecoration {
    pub id: ResourceId,
    pub line: usize,
    pub icon: String,
    pub tooltip: Option<String>,
    pub on_click: Option<String>,
}

impl GutterDecoration {
    pub fn new(id: ResourceId, line: usize, icon: impl Into<String>) -> Self {
        Self {
            id,
            line,
            icon: icon.into(),
            tooltip: None,
            on_click: None,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.on_click = Some(command.into());
        self
    }
}

impl OwnedResource for GutterDecoration {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// Code lens above a zero-based line: a title and an optional command id
/// invoked when the lens is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLens {
    pub id: ResourceId,
    pub line: usize,
    pub title: String,
    pub command: Option<String>,
}

impl CodeLens {
    pub fn new(id: ResourceId, line: usize, title: impl Into<String>) -> Self {
        Self {
            id,
            line,
            title: title.into(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

impl OwnedResource for CodeLens {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// Inline annotation rendered at the end of a zero-based line (ghost text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAnnotation {
    pub id: ResourceId,
    pub line: usize,
    pub text: String,
    pub class: String,
}

impl InlineAnnotation {
    pub fn new(id: ResourceId, line: usize, text: impl Into<String>) -> Self {
        Self {
            id,
            line,
            text: text.into(),
            class: String::from("annotation"),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }
}

impl OwnedResource for InlineAnnotation {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hint,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Hint => write!(f, "hint"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Diagnostic on a zero-based line, with an optional byte span for precise
/// squiggle placement and an optional source label (analyzer name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub id: ResourceId,
    pub line: usize,
    pub span: Option<TextRange>,
    pub severity: Severity,
    pub message: String,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn new(
        id: ResourceId,
        line: usize,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            line,
            span: None,
            severity,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_span(mut self, span: TextRange) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl OwnedResource for Diagnostic {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// Order-preserving store of owned resources.
///
/// Invariants:
/// * at most one item per [`ResourceId`];
/// * upsert replaces an existing item *in place* (insertion position kept)
///   and appends unseen ids in submission order;
/// * `clear_owner` removes exactly the items whose id has that owner.
#[derive(Debug, Clone)]
pub struct ResourceStore<T> {
    items: Vec<T>,
}

impl<T> Default for ResourceStore<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: OwnedResource> ResourceStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a T> {
        self.items.iter().filter(move |item| item.id().owner() == owner)
    }

    /// Upsert a single item: replace in place by id, else append.
    pub fn insert(&mut self, item: T) {
        match self.items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Merge a batch with upsert-by-identifier semantics.
    pub fn upsert(&mut self, incoming: Vec<T>) {
        for item in incoming {
            self.insert(item);
        }
    }

    /// Remove items by explicit identifier list. Returns the removed count.
    pub fn remove_ids(&mut self, ids: &[ResourceId]) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !ids.contains(item.id()));
        before - self.items.len()
    }

    /// Remove every item owned by `owner`. Returns the removed count.
    pub fn clear_owner(&mut self, owner: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.id().owner() != owner);
        let removed = before - self.items.len();
        if removed > 0 {
            tracing::trace!(target: "plugin.resources", owner, removed, "owner_cleared");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: OwnedResource + Clone> ResourceStore<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}
