//! Core editor events and subscriber bookkeeping.
//!
//! The plugin host fans four event kinds out to enabled plugins and to
//! host-application subscribers: content changed, selection changed, saved,
//! and language changed. Dispatch itself lives in `core-plugin`; this crate
//! owns the event payloads and the [`CallbackRegistry`] used for every
//! subscriber list (host-level subscribers, per-kind facade subscriptions,
//! snapshot invalidation listeners).
//!
//! Ordering: registries iterate in insertion order. That order is
//! deterministic so tests can assert against it, but it is not a contract
//! subscribers may rely on relative to each other.

use core_session::SelectionRange;

/// Editor-level event fanned out to plugins and subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// Full document content after the change. The host application decides
    /// the cadence (typically debounced); the dispatcher never debounces.
    ContentChanged { content: String },
    SelectionChanged { selection: SelectionRange },
    Saved { file_name: String },
    LanguageChanged { language: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ContentChanged,
    SelectionChanged,
    Saved,
    LanguageChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::ContentChanged,
        EventKind::SelectionChanged,
        EventKind::Saved,
        EventKind::LanguageChanged,
    ];
}

impl EditorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EditorEvent::ContentChanged { .. } => EventKind::ContentChanged,
            EditorEvent::SelectionChanged { .. } => EventKind::SelectionChanged,
            EditorEvent::Saved { .. } => EventKind::Saved,
            EditorEvent::LanguageChanged { .. } => EventKind::LanguageChanged,
        }
    }
}

/// Handle for removing a subscriber from a [`CallbackRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Insertion-ordered subscriber registry with monotonic ids.
///
/// Generic over the stored callback type so one registry implementation
/// serves event subscribers, facade subscriptions, and snapshot listeners.
/// Single-threaded; ids are never reused within one registry.
#[derive(Debug)]
pub struct CallbackRegistry<F> {
    next_id: u64,
    entries: Vec<(SubscriptionId, F)>,
}

impl<F> Default for CallbackRegistry<F> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl<F> CallbackRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, callback: F) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Returns `true` when the id was present. Removing an already-removed
    /// id is a no-op so teardown paths can be idempotent.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubscriptionId, &F)> {
        self.entries.iter().map(|(id, cb)| (*id, cb))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
