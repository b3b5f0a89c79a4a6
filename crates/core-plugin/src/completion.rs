//! Completion providers and aggregation helpers.
//!
//! Providers are neutral contributors: the host concatenates their results in
//! registration order and imposes no ordering or uniqueness policy of its
//! own. [`sort_completions`] is the consuming-layer helper (stable sort by
//! ascending `sort_order` then label, with optional label deduplication)
//! applied by `PluginHost::sorted_completions` or directly by a rendering
//! layer that wants different policy.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use core_resources::{OwnedResource, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Keyword,
    Function,
    Variable,
    Field,
    Module,
    Snippet,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
    /// Text inserted on accept; the label itself when `None`.
    pub insert_text: Option<String>,
    pub sort_order: i32,
}

impl CompletionItem {
    pub fn new(label: impl Into<String>, kind: CompletionKind) -> Self {
        Self {
            label: label.into(),
            kind,
            detail: None,
            insert_text: None,
            sort_order: 0,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_insert_text(mut self, text: impl Into<String>) -> Self {
        self.insert_text = Some(text.into());
        self
    }

    pub fn with_sort_order(mut self, order: i32) -> Self {
        self.sort_order = order;
        self
    }
}

/// Query context handed to every provider for one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionContext {
    pub content: String,
    /// Cursor position as a byte offset into `content`.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    /// Word under / immediately around the cursor; empty between tokens.
    pub word: String,
    pub language: String,
    pub file_name: String,
    pub trigger: Option<char>,
}

pub type CompletionFn = Rc<dyn Fn(&CompletionContext) -> Vec<CompletionItem>>;

/// A registered completion source. An empty trigger set means the provider
/// participates in every request; a non-empty set restricts it to requests
/// fired by one of those characters (manual invocations always include it).
#[derive(Clone)]
pub struct CompletionProvider {
    pub id: ResourceId,
    pub triggers: Vec<char>,
    pub provide: CompletionFn,
}

impl CompletionProvider {
    pub fn new(
        id: ResourceId,
        provide: impl Fn(&CompletionContext) -> Vec<CompletionItem> + 'static,
    ) -> Self {
        Self {
            id,
            triggers: Vec::new(),
            provide: Rc::new(provide),
        }
    }

    pub fn with_triggers(mut self, triggers: impl IntoIterator<Item = char>) -> Self {
        self.triggers = triggers.into_iter().collect();
        self
    }

    pub fn matches_trigger(&self, trigger: Option<char>) -> bool {
        match trigger {
            Some(c) => self.triggers.is_empty() || self.triggers.contains(&c),
            None => true,
        }
    }
}

impl OwnedResource for CompletionProvider {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

impl fmt::Debug for CompletionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionProvider")
            .field("id", &self.id)
            .field("triggers", &self.triggers)
            .finish_non_exhaustive()
    }
}

/// Identifier-style word around the byte `offset` (alphanumerics and `_`).
/// Returns an empty string when the cursor sits between non-word characters.
pub fn current_word(content: &str, offset: usize) -> String {
    let mut offset = offset.min(content.len());
    while offset > 0 && !content.is_char_boundary(offset) {
        offset -= 1;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = content[..offset]
        .rfind(|c: char| !is_word(c))
        .map(|i| i + content[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    let end = content[offset..]
        .find(|c: char| !is_word(c))
        .map(|i| offset + i)
        .unwrap_or(content.len());
    content[start..end].to_string()
}

/// Consuming-layer ordering contract: stable sort by ascending sort order,
/// ties broken by label; optionally keep only the first item per label.
pub fn sort_completions(items: &mut Vec<CompletionItem>, dedupe_labels: bool) {
    items.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.label.cmp(&b.label))
    });
    if dedupe_labels {
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.label.clone()));
    }
}
