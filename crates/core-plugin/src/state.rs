//! Shared host state behind the controller and every facade handle.
//!
//! Single-threaded cooperative model: one `Rc<RefCell<HostState>>` is shared
//! by the `PluginHost` and every `EditorApi` clone. Borrow discipline is the
//! central invariant of this module: plugin-supplied callbacks (hooks,
//! command handlers, subscribers, snapshot listeners) are *never* invoked
//! while the `RefCell` is borrowed. Callers clone the callback handles out
//! first, so a callback may freely re-enter the facade.
//!
//! Disposables capture a `Weak` reference to this state so the
//! state → disposable → state loop cannot keep the host alive after the
//! embedder drops it.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use core_events::{CallbackRegistry, EditorEvent, EventKind};
use core_resources::{
    CodeLens, Diagnostic, GutterDecoration, InlineAnnotation, InlineDecoration, ResourceId,
    ResourceStore,
};
use core_session::DocumentSession;

use crate::command::CommandRegistry;
use crate::completion::CompletionProvider;
use crate::contrib::{ContextMenuItem, Keybinding};
use crate::panel::PanelDescriptor;
use crate::snapshot::HostSnapshot;

pub(crate) type SharedState = Rc<RefCell<HostState>>;

/// One-shot teardown closure filed under its owning plugin id.
pub(crate) type Disposable = Box<dyn FnOnce()>;

pub(crate) type EventFn = Box<dyn FnMut(&EditorEvent) -> anyhow::Result<()>>;
pub(crate) type SharedEventFn = Rc<RefCell<EventFn>>;

pub(crate) type ListenerFn = Box<dyn FnMut()>;
pub(crate) type SharedListenerFn = Rc<RefCell<ListenerFn>>;

/// A facade event subscription: the owning plugin id plus the callback.
pub(crate) struct FacadeSub {
    pub owner: String,
    pub callback: SharedEventFn,
}

pub(crate) struct HostState {
    pub session: Box<dyn DocumentSession>,
    pub decorations: ResourceStore<InlineDecoration>,
    pub gutter_decorations: ResourceStore<GutterDecoration>,
    pub code_lenses: ResourceStore<CodeLens>,
    pub annotations: ResourceStore<InlineAnnotation>,
    pub diagnostics: ResourceStore<Diagnostic>,
    pub keybindings: ResourceStore<Keybinding>,
    pub context_menu: ResourceStore<ContextMenuItem>,
    pub panels: ResourceStore<PanelDescriptor>,
    /// Rendered `owner:local` ids of panels currently open. Ordered for
    /// deterministic snapshots.
    pub open_panels: BTreeSet<String>,
    pub providers: ResourceStore<CompletionProvider>,
    pub commands: CommandRegistry,
    pub disposables: HashMap<String, Vec<Disposable>>,
    pub event_subs: HashMap<EventKind, CallbackRegistry<FacadeSub>>,
    pub host_subs: CallbackRegistry<SharedEventFn>,
    pub snapshot_listeners: CallbackRegistry<SharedListenerFn>,
    /// Bumped on every aggregate mutation; also invalidates the cache.
    pub version: u64,
    pub cached_snapshot: Option<Rc<HostSnapshot>>,
}

impl HostState {
    pub fn new(session: Box<dyn DocumentSession>) -> SharedState {
        Rc::new(RefCell::new(Self {
            session,
            decorations: ResourceStore::new(),
            gutter_decorations: ResourceStore::new(),
            code_lenses: ResourceStore::new(),
            annotations: ResourceStore::new(),
            diagnostics: ResourceStore::new(),
            keybindings: ResourceStore::new(),
            context_menu: ResourceStore::new(),
            panels: ResourceStore::new(),
            open_panels: BTreeSet::new(),
            providers: ResourceStore::new(),
            commands: CommandRegistry::default(),
            disposables: HashMap::new(),
            event_subs: HashMap::new(),
            host_subs: CallbackRegistry::new(),
            snapshot_listeners: CallbackRegistry::new(),
            version: 0,
            cached_snapshot: None,
        }))
    }

    pub fn mark_dirty(&mut self) {
        self.version += 1;
        self.cached_snapshot = None;
    }

    pub fn add_disposable(&mut self, owner: &str, disposable: Disposable) {
        self.disposables
            .entry(owner.to_string())
            .or_default()
            .push(disposable);
    }

    /// Remove everything owned by `owner` across every store and registry.
    /// Disposables normally get there first for providers/panels/commands/
    /// subscriptions; this pass is the authoritative sweep behind them.
    pub fn clear_owner(&mut self, owner: &str) {
        self.decorations.clear_owner(owner);
        self.gutter_decorations.clear_owner(owner);
        self.code_lenses.clear_owner(owner);
        self.annotations.clear_owner(owner);
        self.diagnostics.clear_owner(owner);
        self.keybindings.clear_owner(owner);
        self.context_menu.clear_owner(owner);
        self.panels.clear_owner(owner);
        self.open_panels
            .retain(|id| ResourceId::parse(id).is_none_or(|rid| rid.owner() != owner));
        self.providers.clear_owner(owner);
        self.commands.clear_owner(owner);
        for registry in self.event_subs.values_mut() {
            let stale: Vec<_> = registry
                .iter()
                .filter(|(_, sub)| sub.owner == owner)
                .map(|(id, _)| id)
                .collect();
            for id in stale {
                registry.remove(id);
            }
        }
    }
}

/// Invoke every snapshot listener. Handles are cloned out first so listeners
/// can re-enter the facade (e.g. pull a fresh snapshot) without a borrow
/// conflict.
pub(crate) fn notify_snapshot_listeners(state: &SharedState) {
    let listeners: Vec<SharedListenerFn> = state
        .borrow()
        .snapshot_listeners
        .iter()
        .map(|(_, listener)| listener.clone())
        .collect();
    for listener in listeners {
        (*listener.borrow_mut())();
    }
}

/// Mark the aggregate dirty and wake invalidation listeners.
pub(crate) fn touch(state: &SharedState) {
    state.borrow_mut().mark_dirty();
    notify_snapshot_listeners(state);
}
