//! Capability facade: the bound API a plugin uses to read editor state and
//! register contributions.
//!
//! Every `EditorApi` is bound to one owning plugin id. Operations that
//! create something revocable (providers, panels, commands, formatters,
//! event subscriptions) transparently file a disposable under that owner,
//! so teardown correctness is enforced by the facade, not by plugin
//! discipline. Resource ids submitted under a foreign or malformed owner are
//! retagged to the bound owner (with a warning), which keeps clear-by-owner
//! exact.
//!
//! The handle is cheap to clone; plugins routinely move clones into command
//! handlers and deferred activation futures.

use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use core_events::{EditorEvent, EventKind, SubscriptionId};
use core_resources::{
    CodeLens, Diagnostic, GutterDecoration, InlineAnnotation, InlineDecoration, OwnedResource,
    ResourceId,
};
use core_session::{CursorPos, FileInfo, Formatter, MessageLevel, SelectionRange};

use crate::command::{self, qualify};
use crate::completion::CompletionProvider;
use crate::contrib::{ContextMenuItem, Keybinding};
use crate::panel::PanelDescriptor;
use crate::state::{touch, EventFn, FacadeSub, HostState, SharedState};

/// Facade event subscription handle. Unsubscribing is idempotent with the
/// automatic teardown at disable: whichever runs second is a no-op.
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    id: SubscriptionId,
    state: Weak<std::cell::RefCell<HostState>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(state) = self.state.upgrade() {
            if let Some(registry) = state.borrow_mut().event_subs.get_mut(&self.kind) {
                registry.remove(self.id);
            }
        }
    }
}

#[derive(Clone)]
pub struct EditorApi {
    owner: String,
    state: SharedState,
}

impl EditorApi {
    pub(crate) fn new(owner: String, state: SharedState) -> Self {
        Self { owner, state }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    // ---------------------------------------------------------------------
    // Session accessors (delegated to the host application's document model)
    // ---------------------------------------------------------------------

    pub fn content(&self) -> String {
        self.state.borrow().session.content()
    }

    pub fn set_content(&self, text: &str) {
        self.state.borrow_mut().session.set_content(text);
    }

    pub fn selection(&self) -> SelectionRange {
        self.state.borrow().session.selection()
    }

    pub fn set_selection(&self, selection: SelectionRange) {
        self.state.borrow_mut().session.set_selection(selection);
    }

    pub fn cursor(&self) -> CursorPos {
        self.state.borrow().session.cursor()
    }

    pub fn set_cursor(&self, cursor: CursorPos) {
        self.state.borrow_mut().session.set_cursor(cursor);
    }

    pub fn file_info(&self) -> FileInfo {
        self.state.borrow().session.file_info()
    }

    pub fn language(&self) -> String {
        self.state.borrow().session.file_info().language
    }

    /// Set the document language. Emitting the corresponding event is the
    /// host application's call (`PluginHost::notify_language_changed`).
    pub fn set_language(&self, language: &str) {
        self.state.borrow_mut().session.set_language(language);
    }

    pub fn theme(&self) -> String {
        self.state.borrow().session.theme()
    }

    pub fn set_theme(&self, theme: &str) {
        self.state.borrow_mut().session.set_theme(theme);
    }

    /// Session-defined ad-hoc state snapshot.
    pub fn state_value(&self) -> Value {
        self.state.borrow().session.state_value()
    }

    pub fn show_message(&self, level: MessageLevel, text: &str) {
        self.state.borrow_mut().session.show_message(level, text);
    }

    // ---------------------------------------------------------------------
    // Owned resources: add / set (upsert) / remove / clear-by-owner
    // ---------------------------------------------------------------------

    fn rehome<T: OwnedResource + RehomeId>(&self, mut item: T) -> T {
        if item.id().owner() != self.owner {
            warn!(
                target: "plugin.host",
                plugin = %self.owner,
                id = %item.id(),
                "foreign_owner_retagged"
            );
            let rehomed = item.id().rehomed(&self.owner);
            item.set_id(rehomed);
        }
        item
    }

    fn own_ids(&self, locals: &[&str]) -> Vec<ResourceId> {
        locals
            .iter()
            .map(|local| ResourceId::new(self.owner.clone(), *local))
            .collect()
    }

    pub fn add_decoration(&self, decoration: InlineDecoration) {
        let decoration = self.rehome(decoration);
        self.state.borrow_mut().decorations.insert(decoration);
        touch(&self.state);
    }

    /// Upsert-by-identifier merge: existing ids are replaced in place, new
    /// ids appended, other plugins' entries untouched.
    pub fn set_decorations(&self, decorations: Vec<InlineDecoration>) {
        let decorations: Vec<_> = decorations.into_iter().map(|d| self.rehome(d)).collect();
        self.state.borrow_mut().decorations.upsert(decorations);
        touch(&self.state);
    }

    /// Remove this plugin's decorations by local id.
    pub fn remove_decorations(&self, locals: &[&str]) {
        let ids = self.own_ids(locals);
        self.state.borrow_mut().decorations.remove_ids(&ids);
        touch(&self.state);
    }

    pub fn clear_decorations(&self) {
        self.state.borrow_mut().decorations.clear_owner(&self.owner);
        touch(&self.state);
    }

    pub fn add_gutter_decoration(&self, decoration: GutterDecoration) {
        let decoration = self.rehome(decoration);
        self.state.borrow_mut().gutter_decorations.insert(decoration);
        touch(&self.state);
    }

    pub fn set_gutter_decorations(&self, decorations: Vec<GutterDecoration>) {
        let decorations: Vec<_> = decorations.into_iter().map(|d| self.rehome(d)).collect();
        self.state.borrow_mut().gutter_decorations.upsert(decorations);
        touch(&self.state);
    }

    pub fn remove_gutter_decorations(&self, locals: &[&str]) {
        let ids = self.own_ids(locals);
        self.state.borrow_mut().gutter_decorations.remove_ids(&ids);
        touch(&self.state);
    }

    pub fn clear_gutter_decorations(&self) {
        self.state
            .borrow_mut()
            .gutter_decorations
            .clear_owner(&self.owner);
        touch(&self.state);
    }

    pub fn add_code_lens(&self, lens: CodeLens) {
        let lens = self.rehome(lens);
        self.state.borrow_mut().code_lenses.insert(lens);
        touch(&self.state);
    }

    pub fn set_code_lenses(&self, lenses: Vec<CodeLens>) {
        let lenses: Vec<_> = lenses.into_iter().map(|l| self.rehome(l)).collect();
        self.state.borrow_mut().code_lenses.upsert(lenses);
        touch(&self.state);
    }

    pub fn remove_code_lenses(&self, locals: &[&str]) {
        let ids = self.own_ids(locals);
        self.state.borrow_mut().code_lenses.remove_ids(&ids);
        touch(&self.state);
    }

    pub fn clear_code_lenses(&self) {
        self.state.borrow_mut().code_lenses.clear_owner(&self.owner);
        touch(&self.state);
    }

    pub fn add_annotation(&self, annotation: InlineAnnotation) {
        let annotation = self.rehome(annotation);
        self.state.borrow_mut().annotations.insert(annotation);
        touch(&self.state);
    }

    pub fn set_annotations(&self, annotations: Vec<InlineAnnotation>) {
        let annotations: Vec<_> = annotations.into_iter().map(|a| self.rehome(a)).collect();
        self.state.borrow_mut().annotations.upsert(annotations);
        touch(&self.state);
    }

    pub fn remove_annotations(&self, locals: &[&str]) {
        let ids = self.own_ids(locals);
        self.state.borrow_mut().annotations.remove_ids(&ids);
        touch(&self.state);
    }

    pub fn clear_annotations(&self) {
        self.state.borrow_mut().annotations.clear_owner(&self.owner);
        touch(&self.state);
    }

    pub fn add_diagnostic(&self, diagnostic: Diagnostic) {
        let diagnostic = self.rehome(diagnostic);
        self.state.borrow_mut().diagnostics.insert(diagnostic);
        touch(&self.state);
    }

    pub fn set_diagnostics(&self, diagnostics: Vec<Diagnostic>) {
        let diagnostics: Vec<_> = diagnostics.into_iter().map(|d| self.rehome(d)).collect();
        self.state.borrow_mut().diagnostics.upsert(diagnostics);
        touch(&self.state);
    }

    pub fn remove_diagnostics(&self, locals: &[&str]) {
        let ids = self.own_ids(locals);
        self.state.borrow_mut().diagnostics.remove_ids(&ids);
        touch(&self.state);
    }

    pub fn clear_diagnostics(&self) {
        self.state.borrow_mut().diagnostics.clear_owner(&self.owner);
        touch(&self.state);
    }

    // ---------------------------------------------------------------------
    // Static-style contributions (also available dynamically)
    // ---------------------------------------------------------------------

    /// Register a keybinding. A bare command name is qualified with the
    /// owning plugin id; an already-namespaced command passes through.
    pub fn bind_key(&self, mut keybinding: Keybinding) {
        keybinding.command = qualify(&self.owner, &keybinding.command);
        let keybinding = self.rehome(keybinding);
        self.state.borrow_mut().keybindings.insert(keybinding);
        touch(&self.state);
    }

    pub fn add_context_menu_item(&self, mut item: ContextMenuItem) {
        item.command = qualify(&self.owner, &item.command);
        let item = self.rehome(item);
        self.state.borrow_mut().context_menu.insert(item);
        touch(&self.state);
    }

    /// Delegate a reformatting routine to the session under the namespaced
    /// id `<owner>:<formatter.id>`; revoked automatically on disable.
    pub fn register_formatter(&self, formatter: Formatter) {
        let full_id = qualify(&self.owner, &formatter.id);
        {
            let mut state = self.state.borrow_mut();
            state.session.register_formatter(Formatter {
                id: full_id.clone(),
                apply: formatter.apply.clone(),
            });
            let weak = Rc::downgrade(&self.state);
            let dispose_id = full_id.clone();
            state.add_disposable(
                &self.owner,
                Box::new(move || {
                    if let Some(state) = weak.upgrade() {
                        state.borrow_mut().session.unregister_formatter(&dispose_id);
                    }
                }),
            );
        }
        debug!(target: "plugin.host", plugin = %self.owner, formatter = %full_id, "formatter_registered");
    }

    // ---------------------------------------------------------------------
    // Completion providers
    // ---------------------------------------------------------------------

    pub fn register_completion_provider(&self, provider: CompletionProvider) {
        let provider = self.rehome(provider);
        let id = provider.id.clone();
        {
            let mut state = self.state.borrow_mut();
            state.providers.insert(provider);
            let weak = Rc::downgrade(&self.state);
            let dispose_id = id.clone();
            state.add_disposable(
                &self.owner,
                Box::new(move || {
                    if let Some(state) = weak.upgrade() {
                        state.borrow_mut().providers.remove_ids(&[dispose_id]);
                    }
                }),
            );
        }
        touch(&self.state);
        debug!(target: "plugin.host", plugin = %self.owner, provider = %id, "completion_provider_registered");
    }

    pub fn unregister_completion_provider(&self, local: &str) -> bool {
        let id = ResourceId::new(self.owner.clone(), local);
        let removed = self.state.borrow_mut().providers.remove_ids(&[id]) > 0;
        if removed {
            touch(&self.state);
        }
        removed
    }

    // ---------------------------------------------------------------------
    // Panels
    // ---------------------------------------------------------------------

    pub fn register_panel(&self, panel: PanelDescriptor) {
        let panel = self.rehome(panel);
        let id = panel.id.clone();
        {
            let mut state = self.state.borrow_mut();
            state.panels.insert(panel);
            let weak = Rc::downgrade(&self.state);
            let dispose_id = id.clone();
            state.add_disposable(
                &self.owner,
                Box::new(move || {
                    if let Some(state) = weak.upgrade() {
                        let mut state = state.borrow_mut();
                        state.open_panels.remove(&dispose_id.to_string());
                        state.panels.remove_ids(&[dispose_id]);
                    }
                }),
            );
        }
        touch(&self.state);
        debug!(target: "plugin.host", plugin = %self.owner, panel = %id, "panel_registered");
    }

    pub fn unregister_panel(&self, local: &str) -> bool {
        let id = ResourceId::new(self.owner.clone(), local);
        let removed = {
            let mut state = self.state.borrow_mut();
            state.open_panels.remove(&id.to_string());
            state.panels.remove_ids(&[id]) > 0
        };
        if removed {
            touch(&self.state);
        }
        removed
    }

    /// Open one of this plugin's registered panels. Unknown local ids are
    /// ignored with a warning.
    pub fn open_panel(&self, local: &str) {
        self.set_panel_open(local, true);
    }

    pub fn close_panel(&self, local: &str) {
        self.set_panel_open(local, false);
    }

    pub fn toggle_panel(&self, local: &str) {
        let id = ResourceId::new(self.owner.clone(), local).to_string();
        let open = self.state.borrow().open_panels.contains(&id);
        self.set_panel_open(local, !open);
    }

    fn set_panel_open(&self, local: &str, open: bool) {
        let id = ResourceId::new(self.owner.clone(), local);
        let changed = {
            let mut state = self.state.borrow_mut();
            if state.panels.get(&id).is_none() {
                warn!(target: "plugin.host", plugin = %self.owner, panel = %id, "unknown_panel_ignored");
                false
            } else if open {
                state.open_panels.insert(id.to_string())
            } else {
                state.open_panels.remove(&id.to_string())
            }
        };
        if changed {
            touch(&self.state);
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Register a command under `<owner>:<name>`; returns the full id.
    /// Duplicate ids are a logged no-op (the first handler wins).
    pub fn register_command(
        &self,
        name: &str,
        handler: impl FnMut(&[Value]) -> anyhow::Result<()> + 'static,
    ) -> String {
        let registered = {
            let mut state = self.state.borrow_mut();
            state.commands.register(&self.owner, name, Box::new(handler))
        };
        let full_id = match registered {
            Some(id) => {
                let weak = Rc::downgrade(&self.state);
                let dispose_id = id.clone();
                self.state.borrow_mut().add_disposable(
                    &self.owner,
                    Box::new(move || {
                        if let Some(state) = weak.upgrade() {
                            state.borrow_mut().commands.remove(&dispose_id);
                        }
                    }),
                );
                touch(&self.state);
                id
            }
            None => command::namespaced(&self.owner, name),
        };
        full_id
    }

    /// Invoke a command by full id. Unknown ids log a warning; handler
    /// failures are logged, never propagated.
    pub fn execute_command(&self, id: &str, args: &[Value]) {
        let handler = self.state.borrow().commands.lookup(id);
        match handler {
            Some(handler) => command::invoke(id, &handler, args),
            None => warn!(target: "plugin.command", command = %id, "unknown_command_ignored"),
        }
    }

    /// Full id this plugin's command `name` is registered under. Handy when
    /// wiring code lenses or gutter click commands.
    pub fn command_id(&self, name: &str) -> String {
        command::namespaced(&self.owner, name)
    }

    // ---------------------------------------------------------------------
    // Event subscriptions
    // ---------------------------------------------------------------------

    pub fn on_content_change(
        &self,
        mut callback: impl FnMut(&str) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        self.subscribe_kind(
            EventKind::ContentChanged,
            Box::new(move |event| match event {
                EditorEvent::ContentChanged { content } => callback(content),
                _ => Ok(()),
            }),
        )
    }

    pub fn on_selection_change(
        &self,
        mut callback: impl FnMut(SelectionRange) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        self.subscribe_kind(
            EventKind::SelectionChanged,
            Box::new(move |event| match event {
                EditorEvent::SelectionChanged { selection } => callback(*selection),
                _ => Ok(()),
            }),
        )
    }

    pub fn on_save(
        &self,
        mut callback: impl FnMut(&str) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        self.subscribe_kind(
            EventKind::Saved,
            Box::new(move |event| match event {
                EditorEvent::Saved { file_name } => callback(file_name),
                _ => Ok(()),
            }),
        )
    }

    pub fn on_language_change(
        &self,
        mut callback: impl FnMut(&str) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        self.subscribe_kind(
            EventKind::LanguageChanged,
            Box::new(move |event| match event {
                EditorEvent::LanguageChanged { language } => callback(language),
                _ => Ok(()),
            }),
        )
    }

    fn subscribe_kind(&self, kind: EventKind, callback: EventFn) -> Subscription {
        let shared = Rc::new(std::cell::RefCell::new(callback));
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.event_subs.entry(kind).or_default().insert(FacadeSub {
                owner: self.owner.clone(),
                callback: shared,
            });
            let weak = Rc::downgrade(&self.state);
            state.add_disposable(
                &self.owner,
                Box::new(move || {
                    if let Some(state) = weak.upgrade() {
                        if let Some(registry) = state.borrow_mut().event_subs.get_mut(&kind) {
                            registry.remove(id);
                        }
                    }
                }),
            );
            id
        };
        Subscription {
            kind,
            id,
            state: Rc::downgrade(&self.state),
        }
    }

    /// File a plugin-custom teardown closure, run exactly once at disable.
    pub fn add_disposable(&self, disposable: impl FnOnce() + 'static) {
        self.state
            .borrow_mut()
            .add_disposable(&self.owner, Box::new(disposable));
    }
}

impl std::fmt::Debug for EditorApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorApi")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Internal seam letting the facade retag a foreign-owned id. Implemented by
/// every owned-resource type the facade accepts.
pub(crate) trait RehomeId {
    fn set_id(&mut self, id: ResourceId);
}

macro_rules! impl_rehome {
    ($($ty:ty),+ $(,)?) => {
        $(impl RehomeId for $ty {
            fn set_id(&mut self, id: ResourceId) {
                self.id = id;
            }
        })+
    };
}

impl_rehome!(
    InlineDecoration,
    GutterDecoration,
    CodeLens,
    InlineAnnotation,
    Diagnostic,
    Keybinding,
    ContextMenuItem,
    PanelDescriptor,
    CompletionProvider,
);
