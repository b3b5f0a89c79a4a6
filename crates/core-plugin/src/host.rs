//! Plugin lifecycle controller, event dispatcher, and snapshot bridge.
//!
//! One [`PluginHost`] instance exists per editable document/session, owned
//! and explicitly constructed by the host application; there is no
//! module-level singleton state. It drives the per-plugin state machine
//! `Unregistered → Registered → Enabled ⇄ Disabled → Unregistered`, fans
//! events out to enabled plugins, and exposes the pull-based snapshot
//! bridge the rendering layer consumes.
//!
//! Fault isolation is the central reliability property: every boundary
//! where a plugin-supplied function is invoked logs its failure with the
//! plugin id and hook name and continues. Nothing in this module propagates
//! a plugin failure to the host application's control flow.

use std::rc::Rc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use core_events::{EditorEvent, SubscriptionId};
use core_resources::ResourceId;
use core_session::{byte_offset_at, DocumentSession};

use crate::api::EditorApi;
use crate::command::{self, NAMESPACE_SEP};
use crate::completion::{
    current_word, sort_completions, CompletionContext, CompletionItem, CompletionProvider,
};
use crate::config::HostConfig;
use crate::plugin::{Activation, ActivationFuture, ActivationToken, Plugin};
use crate::snapshot::{HostSnapshot, PanelInfo, PluginInfo};
use crate::state::{
    notify_snapshot_listeners, touch, EventFn, HostState, ListenerFn, SharedEventFn, SharedState,
};

struct PluginEntry {
    plugin: Plugin,
    enabled: bool,
    token: Option<ActivationToken>,
}

/// A queued deferred activation: the future `on_activate` returned, paired
/// with its liveness token. The host never awaits these; see
/// [`PluginHost::spawn_deferred_activations`].
pub struct DeferredActivation {
    pub plugin_id: String,
    token: ActivationToken,
    future: ActivationFuture,
}

impl DeferredActivation {
    pub fn token(&self) -> &ActivationToken {
        &self.token
    }

    pub fn into_parts(self) -> (String, ActivationToken, ActivationFuture) {
        (self.plugin_id, self.token, self.future)
    }
}

pub struct PluginHost {
    state: SharedState,
    plugins: Vec<PluginEntry>,
    config: HostConfig,
    deferred: Vec<DeferredActivation>,
}

fn log_hook_result(plugin: &str, hook: &'static str, result: anyhow::Result<()>) {
    if let Err(err) = result {
        warn!(
            target: "plugin.host",
            plugin = %plugin,
            hook,
            error = %format!("{err:#}"),
            "plugin_hook_failed"
        );
    }
}

impl PluginHost {
    pub fn new(session: Box<dyn DocumentSession>) -> Self {
        Self::with_config(session, HostConfig::default())
    }

    pub fn with_config(session: Box<dyn DocumentSession>, config: HostConfig) -> Self {
        Self {
            state: HostState::new(session),
            plugins: Vec::new(),
            config,
            deferred: Vec::new(),
        }
    }

    /// Run a closure against the underlying session (host-application edits
    /// flow through here; plugins use their facade instead).
    pub fn with_session<R>(&self, f: impl FnOnce(&mut dyn DocumentSession) -> R) -> R {
        f(self.state.borrow_mut().session.as_mut())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Register a plugin. Duplicate ids are a logged no-op. Unless the
    /// plugin opts out via `default_enabled(false)` or the config lists it
    /// as disabled, registration immediately enables it.
    pub fn register(&mut self, plugin: Plugin) {
        let id = plugin.id().to_string();
        if id.is_empty() || id.contains(NAMESPACE_SEP) {
            warn!(target: "plugin.host", plugin = %id, "invalid_plugin_id_rejected");
            return;
        }
        if self.plugins.iter().any(|entry| entry.plugin.id() == id) {
            warn!(target: "plugin.host", plugin = %id, "duplicate_registration_ignored");
            return;
        }
        info!(
            target: "plugin.host",
            plugin = %id,
            name = plugin.name(),
            version = plugin.version(),
            "plugin_registered"
        );
        let auto_enable =
            plugin.default_enabled() && !self.config.plugins.disabled.iter().any(|d| *d == id);
        self.plugins.push(PluginEntry {
            plugin,
            enabled: false,
            token: None,
        });
        touch(&self.state);
        if auto_enable {
            self.enable(&id);
        }
    }

    pub fn register_all(&mut self, plugins: impl IntoIterator<Item = Plugin>) {
        for plugin in plugins {
            self.register(plugin);
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.plugins.iter().any(|entry| entry.plugin.id() == id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.plugins
            .iter()
            .any(|entry| entry.plugin.id() == id && entry.enabled)
    }

    /// Registered plugin ids in registration order.
    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins
            .iter()
            .map(|entry| entry.plugin.id().to_string())
            .collect()
    }

    /// Enable a registered plugin. Unknown ids and already-enabled plugins
    /// are no-ops. Synchronous: a deferred activation future is queued, not
    /// awaited, and its eventual failure never un-enables the plugin.
    pub fn enable(&mut self, id: &str) {
        let Some(idx) = self.plugins.iter().position(|e| e.plugin.id() == id) else {
            debug!(target: "plugin.host", plugin = %id, "enable_unknown_plugin_ignored");
            return;
        };
        if self.plugins[idx].enabled {
            return;
        }
        let owner = id.to_string();
        let token = ActivationToken::new();
        self.plugins[idx].enabled = true;
        self.plugins[idx].token = Some(token.clone());
        info!(target: "plugin.host", plugin = %owner, "plugin_enabled");

        let mut api = EditorApi::new(owner.clone(), self.state.clone());
        let mut deferred = None;
        {
            let hooks = &mut self.plugins[idx].plugin.hooks;
            if let Some(hook) = hooks.on_init.as_mut() {
                log_hook_result(&owner, "on_init", hook(&mut api));
            }
            if let Some(hook) = hooks.on_mount.as_mut() {
                log_hook_result(&owner, "on_mount", hook(&mut api));
            }
            if let Some(hook) = hooks.on_activate.as_mut() {
                match hook(&mut api, token.clone()) {
                    Ok(Activation::Ready) => {}
                    Ok(Activation::Deferred(future)) => deferred = Some(future),
                    Err(err) => log_hook_result(&owner, "on_activate", Err(err)),
                }
            }
        }
        if let Some(future) = deferred {
            trace!(target: "plugin.host", plugin = %owner, "deferred_activation_queued");
            self.deferred.push(DeferredActivation {
                plugin_id: owner.clone(),
                token,
                future,
            });
        }

        // Static contributions go through the same facade path as dynamic
        // registrations, so teardown treats both identically.
        let (keybindings, menu_items, formatters, panels, providers) = {
            let plugin = &self.plugins[idx].plugin;
            (
                plugin.keybindings.clone(),
                plugin.context_menu.clone(),
                plugin.formatters.clone(),
                plugin.panels.clone(),
                plugin.completion_providers.clone(),
            )
        };
        for keybinding in keybindings {
            api.bind_key(keybinding);
        }
        for item in menu_items {
            api.add_context_menu_item(item);
        }
        for formatter in formatters {
            api.register_formatter(formatter);
        }
        for panel in panels {
            api.register_panel(panel);
        }
        for provider in providers {
            api.register_completion_provider(provider);
        }
        touch(&self.state);
    }

    /// Disable an enabled plugin: deactivation hooks, then its disposables
    /// (each exactly once), then an owner sweep across every store. Unknown
    /// or already-disabled ids are no-ops.
    pub fn disable(&mut self, id: &str) {
        let Some(idx) = self.plugins.iter().position(|e| e.plugin.id() == id) else {
            debug!(target: "plugin.host", plugin = %id, "disable_unknown_plugin_ignored");
            return;
        };
        if !self.plugins[idx].enabled {
            return;
        }
        let owner = id.to_string();
        let mut api = EditorApi::new(owner.clone(), self.state.clone());
        {
            let hooks = &mut self.plugins[idx].plugin.hooks;
            if let Some(hook) = hooks.on_deactivate.as_mut() {
                log_hook_result(&owner, "on_deactivate", hook(&mut api));
            }
            if let Some(hook) = hooks.on_unmount.as_mut() {
                log_hook_result(&owner, "on_unmount", hook(&mut api));
            }
        }
        if let Some(token) = self.plugins[idx].token.take() {
            token.cancel();
        }

        // Disposables first (they unregister providers/panels/commands/
        // subscriptions/formatters), then the authoritative owner sweep.
        let disposables = self
            .state
            .borrow_mut()
            .disposables
            .remove(&owner)
            .unwrap_or_default();
        let disposed = disposables.len();
        for disposable in disposables {
            disposable();
        }
        self.state.borrow_mut().clear_owner(&owner);
        self.plugins[idx].enabled = false;
        info!(target: "plugin.host", plugin = %owner, disposed, "plugin_disabled");
        touch(&self.state);
    }

    /// Disable (idempotently) and forget a plugin entirely.
    pub fn unregister(&mut self, id: &str) {
        if !self.is_registered(id) {
            debug!(target: "plugin.host", plugin = %id, "unregister_unknown_plugin_ignored");
            return;
        }
        self.disable(id);
        self.plugins.retain(|entry| entry.plugin.id() != id);
        info!(target: "plugin.host", plugin = %id, "plugin_unregistered");
        touch(&self.state);
    }

    /// Single teardown path: disable every enabled plugin, then clear all
    /// internal maps and sets.
    pub fn destroy(&mut self) {
        let ids = self.plugin_ids();
        for id in &ids {
            self.disable(id);
        }
        self.plugins.clear();
        self.deferred.clear();
        {
            let mut state = self.state.borrow_mut();
            state.decorations.clear();
            state.gutter_decorations.clear();
            state.code_lenses.clear();
            state.annotations.clear();
            state.diagnostics.clear();
            state.keybindings.clear();
            state.context_menu.clear();
            state.panels.clear();
            state.open_panels.clear();
            state.providers.clear();
            state.commands.clear();
            state.disposables.clear();
            state.event_subs.clear();
            state.host_subs.clear();
            state.mark_dirty();
        }
        notify_snapshot_listeners(&self.state);
        self.state.borrow_mut().snapshot_listeners.clear();
        info!(target: "plugin.host", plugins = ids.len(), "host_destroyed");
    }

    // ---------------------------------------------------------------------
    // Event dispatch
    // ---------------------------------------------------------------------

    /// Fan an event out: host-level subscribers first, then enabled
    /// plugins' hooks in registration order, then facade subscriptions.
    /// Every call is fault-isolated. Content-change cadence (debouncing) is
    /// the host application's responsibility, not the dispatcher's.
    pub fn emit(&mut self, event: EditorEvent) {
        let kind = event.kind();
        trace!(target: "plugin.events", ?kind, "dispatch");

        let host_subs: Vec<SharedEventFn> = self
            .state
            .borrow()
            .host_subs
            .iter()
            .map(|(_, sub)| sub.clone())
            .collect();
        for sub in host_subs {
            if let Err(err) = (*sub.borrow_mut())(&event) {
                warn!(
                    target: "plugin.events",
                    error = %format!("{err:#}"),
                    "host_subscriber_failed"
                );
            }
        }

        for idx in 0..self.plugins.len() {
            if !self.plugins[idx].enabled {
                continue;
            }
            let owner = self.plugins[idx].plugin.id().to_string();
            let mut api = EditorApi::new(owner.clone(), self.state.clone());
            let hooks = &mut self.plugins[idx].plugin.hooks;
            let (hook_name, result) = match &event {
                EditorEvent::ContentChanged { content } => (
                    "on_content_change",
                    hooks
                        .on_content_change
                        .as_mut()
                        .map(|hook| hook(&mut api, content)),
                ),
                EditorEvent::SelectionChanged { selection } => (
                    "on_selection_change",
                    hooks
                        .on_selection_change
                        .as_mut()
                        .map(|hook| hook(&mut api, *selection)),
                ),
                EditorEvent::Saved { file_name } => (
                    "on_save",
                    hooks.on_save.as_mut().map(|hook| hook(&mut api, file_name)),
                ),
                EditorEvent::LanguageChanged { language } => (
                    "on_language_change",
                    hooks
                        .on_language_change
                        .as_mut()
                        .map(|hook| hook(&mut api, language)),
                ),
            };
            if let Some(result) = result {
                log_hook_result(&owner, hook_name, result);
            }
        }

        let facade_subs: Vec<(String, SharedEventFn)> = self
            .state
            .borrow()
            .event_subs
            .get(&kind)
            .map(|registry| {
                registry
                    .iter()
                    .map(|(_, sub)| (sub.owner.clone(), sub.callback.clone()))
                    .collect()
            })
            .unwrap_or_default();
        for (owner, callback) in facade_subs {
            if !self.is_enabled(&owner) {
                continue;
            }
            if let Err(err) = (*callback.borrow_mut())(&event) {
                warn!(
                    target: "plugin.events",
                    plugin = %owner,
                    error = %format!("{err:#}"),
                    "subscription_callback_failed"
                );
            }
        }
    }

    /// Emit `ContentChanged` with the session's current content.
    pub fn notify_content_changed(&mut self) {
        let content = self.state.borrow().session.content();
        self.emit(EditorEvent::ContentChanged { content });
    }

    pub fn notify_selection_changed(&mut self) {
        let selection = self.state.borrow().session.selection();
        self.emit(EditorEvent::SelectionChanged { selection });
    }

    pub fn notify_saved(&mut self) {
        let file_name = self.state.borrow().session.file_info().name;
        self.emit(EditorEvent::Saved { file_name });
    }

    pub fn notify_language_changed(&mut self) {
        let language = self.state.borrow().session.file_info().language;
        self.emit(EditorEvent::LanguageChanged { language });
    }

    /// Host-application-level subscriber, independent of any plugin.
    pub fn subscribe_events(
        &mut self,
        mut callback: impl FnMut(&EditorEvent) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        let callback: EventFn = Box::new(move |event: &EditorEvent| callback(event));
        self.state
            .borrow_mut()
            .host_subs
            .insert(Rc::new(std::cell::RefCell::new(callback)))
    }

    pub fn unsubscribe_events(&mut self, id: SubscriptionId) -> bool {
        self.state.borrow_mut().host_subs.remove(id)
    }

    // ---------------------------------------------------------------------
    // Deferred activation
    // ---------------------------------------------------------------------

    pub fn pending_activations(&self) -> usize {
        self.deferred.len()
    }

    /// Detach queued activation futures onto the current-thread runtime.
    /// Must run inside a `tokio::task::LocalSet` (the futures are `!Send`).
    /// Results are used only for logging; a failure after the owning plugin
    /// was disabled (dead token) is demoted to debug.
    pub fn spawn_deferred_activations(&mut self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.deferred.len());
        for deferred in self.deferred.drain(..) {
            let DeferredActivation {
                plugin_id,
                token,
                future,
            } = deferred;
            handles.push(tokio::task::spawn_local(async move {
                match future.await {
                    Ok(()) => {
                        debug!(target: "plugin.host", plugin = %plugin_id, "deferred_activation_complete");
                    }
                    Err(err) if token.is_live() => {
                        warn!(
                            target: "plugin.host",
                            plugin = %plugin_id,
                            error = %format!("{err:#}"),
                            "deferred_activation_failed"
                        );
                    }
                    Err(err) => {
                        debug!(
                            target: "plugin.host",
                            plugin = %plugin_id,
                            error = %format!("{err:#}"),
                            "stale_activation_failed_after_disable"
                        );
                    }
                }
            }));
        }
        handles
    }

    /// Hand the queued futures to an embedder-managed executor instead.
    pub fn take_deferred_activations(&mut self) -> Vec<DeferredActivation> {
        std::mem::take(&mut self.deferred)
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Invoke a registered command by full `owner:name` id. Unknown ids log
    /// a warning and return; handler failures are logged, never propagated.
    pub fn execute_command(&mut self, id: &str, args: &[Value]) {
        let handler = self.state.borrow().commands.lookup(id);
        match handler {
            Some(handler) => command::invoke(id, &handler, args),
            None => warn!(target: "plugin.command", command = %id, "unknown_command_ignored"),
        }
    }

    // ---------------------------------------------------------------------
    // Completion aggregation
    // ---------------------------------------------------------------------

    fn completion_context(&self, trigger: Option<char>) -> CompletionContext {
        let state = self.state.borrow();
        let content = state.session.content();
        let cursor = state.session.cursor();
        let file = state.session.file_info();
        let offset = byte_offset_at(&content, cursor);
        let word = current_word(&content, offset);
        CompletionContext {
            offset,
            line: cursor.line,
            column: cursor.column,
            word,
            language: file.language,
            file_name: file.name,
            trigger,
            content,
        }
    }

    /// Concatenated provider results in registration order; no ordering or
    /// uniqueness policy applied. Trigger-restricted providers are skipped
    /// when `trigger` does not match.
    pub fn completions(&mut self, trigger: Option<char>) -> Vec<CompletionItem> {
        let context = self.completion_context(trigger);
        let providers: Vec<CompletionProvider> =
            self.state.borrow().providers.iter().cloned().collect();
        let mut items = Vec::new();
        for provider in providers {
            if !provider.matches_trigger(trigger) {
                continue;
            }
            items.extend((*provider.provide)(&context));
        }
        items
    }

    /// [`Self::completions`] plus the consuming-layer ordering contract:
    /// ascending sort order then label, deduped by label per config.
    pub fn sorted_completions(&mut self, trigger: Option<char>) -> Vec<CompletionItem> {
        let mut items = self.completions(trigger);
        sort_completions(&mut items, self.config.completion.dedupe_labels);
        items
    }

    // ---------------------------------------------------------------------
    // Panels
    // ---------------------------------------------------------------------

    /// Toggle a panel by its rendered `owner:local` id. Returns the new
    /// open state, or `None` for an unknown panel.
    pub fn toggle_panel(&mut self, full_id: &str) -> Option<bool> {
        let Some(resource_id) = ResourceId::parse(full_id) else {
            warn!(target: "plugin.host", panel = %full_id, "unqualified_panel_id_ignored");
            return None;
        };
        let open = {
            let mut state = self.state.borrow_mut();
            state.panels.get(&resource_id)?;
            if state.open_panels.contains(full_id) {
                state.open_panels.remove(full_id);
                false
            } else {
                state.open_panels.insert(full_id.to_string());
                true
            }
        };
        touch(&self.state);
        Some(open)
    }

    pub fn open_panel(&mut self, full_id: &str) {
        self.set_panel_open(full_id, true);
    }

    pub fn close_panel(&mut self, full_id: &str) {
        self.set_panel_open(full_id, false);
    }

    fn set_panel_open(&mut self, full_id: &str, open: bool) {
        let Some(resource_id) = ResourceId::parse(full_id) else {
            warn!(target: "plugin.host", panel = %full_id, "unqualified_panel_id_ignored");
            return;
        };
        let changed = {
            let mut state = self.state.borrow_mut();
            if state.panels.get(&resource_id).is_none() {
                warn!(target: "plugin.host", panel = %full_id, "unknown_panel_ignored");
                return;
            }
            if open {
                state.open_panels.insert(full_id.to_string())
            } else {
                state.open_panels.remove(full_id)
            }
        };
        if changed {
            touch(&self.state);
        }
    }

    /// Render a panel body through its owning plugin's facade.
    pub fn render_panel(&mut self, full_id: &str) -> Option<String> {
        let resource_id = ResourceId::parse(full_id)?;
        let render = {
            let state = self.state.borrow();
            state.panels.get(&resource_id).map(|panel| panel.render.clone())
        }?;
        let mut api = EditorApi::new(resource_id.owner().to_string(), self.state.clone());
        Some((*render)(&mut api))
    }

    // ---------------------------------------------------------------------
    // Snapshot bridge
    // ---------------------------------------------------------------------

    /// Current aggregate state. Cached: repeated calls without an
    /// intervening mutation return the same `Rc` allocation.
    pub fn snapshot(&mut self) -> Rc<HostSnapshot> {
        if let Some(cached) = self.state.borrow().cached_snapshot.clone() {
            return cached;
        }
        let snapshot = Rc::new(self.build_snapshot());
        self.state.borrow_mut().cached_snapshot = Some(snapshot.clone());
        snapshot
    }

    /// Subscribe to snapshot invalidation. Listeners get a no-payload wake
    /// after every mutation and re-pull [`Self::snapshot`] themselves.
    pub fn subscribe(&mut self, listener: impl FnMut() + 'static) -> SubscriptionId {
        let listener: ListenerFn = Box::new(listener);
        self.state
            .borrow_mut()
            .snapshot_listeners
            .insert(Rc::new(std::cell::RefCell::new(listener)))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.state.borrow_mut().snapshot_listeners.remove(id)
    }

    fn build_snapshot(&self) -> HostSnapshot {
        let plugins: Vec<PluginInfo> = self
            .plugins
            .iter()
            .map(|entry| PluginInfo {
                id: entry.plugin.id().to_string(),
                name: entry.plugin.name().to_string(),
                version: entry.plugin.version().to_string(),
                category: entry.plugin.category().to_string(),
                depends_on: entry.plugin.depends_on().to_vec(),
                enabled: entry.enabled,
            })
            .collect();
        let enabled_plugins = plugins
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.id.clone())
            .collect();
        let state = self.state.borrow();
        HostSnapshot {
            version: state.version,
            plugins,
            enabled_plugins,
            decorations: state.decorations.to_vec(),
            gutter_decorations: state.gutter_decorations.to_vec(),
            code_lenses: state.code_lenses.to_vec(),
            annotations: state.annotations.to_vec(),
            diagnostics: state.diagnostics.to_vec(),
            keybindings: state.keybindings.to_vec(),
            context_menu: state.context_menu.to_vec(),
            panels: state
                .panels
                .iter()
                .map(|panel| {
                    let id = panel.id.to_string();
                    PanelInfo {
                        open: state.open_panels.contains(&id),
                        id,
                        title: panel.title.clone(),
                        position: panel.position,
                        default_size: panel.default_size,
                    }
                })
                .collect(),
            open_panels: state.open_panels.iter().cloned().collect(),
            commands: state.commands.ids(),
        }
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("plugins", &self.plugins.len())
            .field("pending_activations", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use pretty_assertions::assert_eq;

    use core_resources::{Diagnostic, ResourceId, Severity};
    use core_session::MemorySession;

    use crate::config::PluginsConfig;
    use crate::panel::{PanelDescriptor, PanelPosition};

    use super::*;

    fn host() -> PluginHost {
        PluginHost::new(Box::new(MemorySession::new()))
    }

    #[test]
    fn register_auto_enables_by_default() {
        let mut host = host();
        host.register(Plugin::new("lint", "Lint", "1.0.0"));
        assert!(host.is_registered("lint"));
        assert!(host.is_enabled("lint"));
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let mut host = host();
        let ran = Rc::new(Cell::new(0u32));
        let first = ran.clone();
        let second = ran.clone();
        host.register(Plugin::new("lint", "Lint", "1.0.0").on_init(move |_| {
            first.set(first.get() + 1);
            Ok(())
        }));
        host.register(Plugin::new("lint", "Other", "2.0.0").on_init(move |_| {
            second.set(second.get() + 10);
            Ok(())
        }));
        assert_eq!(ran.get(), 1);
        assert_eq!(host.plugin_ids(), vec!["lint".to_string()]);
    }

    #[test]
    fn invalid_plugin_ids_are_rejected() {
        let mut host = host();
        host.register(Plugin::new("", "Empty", "1.0.0"));
        host.register(Plugin::new("a:b", "Colon", "1.0.0"));
        assert!(host.plugin_ids().is_empty());
    }

    #[test]
    fn enable_is_idempotent() {
        let mut host = host();
        let mounts = Rc::new(Cell::new(0u32));
        let counter = mounts.clone();
        host.register(Plugin::new("p", "P", "1.0.0").on_mount(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        }));
        host.enable("p");
        host.enable("p");
        assert_eq!(mounts.get(), 1);
    }

    #[test]
    fn config_disabled_plugins_stay_registered_but_disabled() {
        let config = HostConfig {
            plugins: PluginsConfig {
                disabled: vec!["noisy".to_string()],
            },
            ..HostConfig::default()
        };
        let mut host = PluginHost::with_config(Box::new(MemorySession::new()), config);
        host.register(Plugin::new("noisy", "Noisy", "1.0.0"));
        assert!(host.is_registered("noisy"));
        assert!(!host.is_enabled("noisy"));
        host.enable("noisy");
        assert!(host.is_enabled("noisy"));
    }

    #[test]
    fn default_disabled_plugin_waits_for_explicit_enable() {
        let mut host = host();
        host.register(Plugin::new("opt", "Opt-in", "1.0.0").with_default_enabled(false));
        assert!(!host.is_enabled("opt"));
        host.enable("opt");
        assert!(host.is_enabled("opt"));
    }

    #[test]
    fn hook_failures_never_propagate() {
        let mut host = host();
        host.register(
            Plugin::new("bad", "Bad", "1.0.0")
                .on_init(|_| anyhow::bail!("init exploded"))
                .on_content_change(|_, _| anyhow::bail!("hook exploded")),
        );
        let seen = Rc::new(Cell::new(0u32));
        let counter = seen.clone();
        host.register(Plugin::new("good", "Good", "1.0.0").on_content_change(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        }));
        assert!(host.is_enabled("bad"));
        host.emit(EditorEvent::ContentChanged {
            content: "fn main() {}".to_string(),
        });
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn events_reach_hooks_in_registration_order() {
        let mut host = host();
        let order = Rc::new(RefCell::new(Vec::new()));
        for id in ["first", "second", "third"] {
            let order = order.clone();
            host.register(Plugin::new(id, id, "1.0.0").on_save(move |_, _| {
                order.borrow_mut().push(id);
                Ok(())
            }));
        }
        host.emit(EditorEvent::Saved {
            file_name: "main.rs".to_string(),
        });
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn disabled_plugin_receives_no_events() {
        let mut host = host();
        let seen = Rc::new(Cell::new(0u32));
        let counter = seen.clone();
        host.register(Plugin::new("watch", "Watch", "1.0.0").on_selection_change(
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
        ));
        host.notify_selection_changed();
        host.disable("watch");
        host.notify_selection_changed();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn disable_sweeps_every_owned_resource() {
        let mut host = host();
        host.register(Plugin::new("lint", "Lint", "1.0.0").on_mount(|api| {
            api.add_diagnostic(Diagnostic::new(
                ResourceId::new("lint", "1"),
                3,
                Severity::Error,
                "bad",
            ));
            api.register_command("fix", |_| Ok(()));
            Ok(())
        }));
        let snapshot = host.snapshot();
        assert_eq!(snapshot.diagnostics.len(), 1);
        assert_eq!(snapshot.commands, vec!["lint:fix".to_string()]);

        host.disable("lint");
        let snapshot = host.snapshot();
        assert!(!snapshot.owns_anything("lint"));
        assert!(snapshot.commands.is_empty());
        assert!(host.is_registered("lint"));
    }

    #[test]
    fn disposables_run_exactly_once() {
        let mut host = host();
        let runs = Rc::new(Cell::new(0u32));
        let counter = runs.clone();
        host.register(Plugin::new("p", "P", "1.0.0").on_mount(move |api| {
            let counter = counter.clone();
            api.add_disposable(move || counter.set(counter.get() + 1));
            Ok(())
        }));
        host.disable("p");
        host.disable("p");
        host.unregister("p");
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn unregister_tears_down_and_forgets() {
        let mut host = host();
        host.register(Plugin::new("p", "P", "1.0.0").on_mount(|api| {
            api.add_diagnostic(Diagnostic::new(
                ResourceId::new("p", "1"),
                1,
                Severity::Info,
                "note",
            ));
            Ok(())
        }));
        host.unregister("p");
        assert!(!host.is_registered("p"));
        assert!(host.snapshot().diagnostics.is_empty());
        // Re-registration starts from a clean slate.
        host.register(Plugin::new("p", "P", "1.1.0"));
        assert!(host.is_enabled("p"));
    }

    #[test]
    fn snapshot_is_cached_until_mutation() {
        let mut host = host();
        host.register(Plugin::new("p", "P", "1.0.0"));
        let first = host.snapshot();
        let second = host.snapshot();
        assert!(Rc::ptr_eq(&first, &second));

        host.with_session(|_| {});
        let unchanged = host.snapshot();
        assert!(Rc::ptr_eq(&first, &unchanged));

        host.disable("p");
        let third = host.snapshot();
        assert!(!Rc::ptr_eq(&first, &third));
        assert!(third.version > first.version);
        // The old snapshot is immutable history.
        assert_eq!(first.enabled_plugins, vec!["p".to_string()]);
        assert!(third.enabled_plugins.is_empty());
    }

    #[test]
    fn snapshot_listeners_fire_on_every_mutation() {
        let mut host = host();
        let wakes = Rc::new(Cell::new(0u32));
        let counter = wakes.clone();
        let sub = host.subscribe(move || counter.set(counter.get() + 1));
        host.register(Plugin::new("p", "P", "1.0.0").on_mount(|api| {
            api.set_diagnostics(vec![]);
            Ok(())
        }));
        assert!(wakes.get() >= 2);

        let before = wakes.get();
        host.unsubscribe(sub);
        host.disable("p");
        assert_eq!(wakes.get(), before);
    }

    #[test]
    fn facade_subscriptions_are_severed_on_disable() {
        let mut host = host();
        let seen = Rc::new(Cell::new(0u32));
        let counter = seen.clone();
        host.register(Plugin::new("sub", "Sub", "1.0.0").on_mount(move |api| {
            let counter = counter.clone();
            api.on_content_change(move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            });
            Ok(())
        }));
        host.emit(EditorEvent::ContentChanged {
            content: String::new(),
        });
        host.disable("sub");
        host.emit(EditorEvent::ContentChanged {
            content: String::new(),
        });
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn static_panels_toggle_through_host() {
        let mut host = host();
        host.register(Plugin::new("tree", "Tree", "1.0.0").with_panel(PanelDescriptor::new(
            ResourceId::new("tree", "explorer"),
            "Explorer",
            PanelPosition::Side,
            |_| "root/".to_string(),
        )));
        assert_eq!(host.toggle_panel("tree:explorer"), Some(true));
        assert_eq!(
            host.snapshot().open_panels,
            vec!["tree:explorer".to_string()]
        );
        assert_eq!(host.render_panel("tree:explorer").as_deref(), Some("root/"));
        assert_eq!(host.toggle_panel("tree:explorer"), Some(false));
        assert_eq!(host.toggle_panel("tree:missing"), None);
        assert_eq!(host.toggle_panel("unqualified"), None);
    }

    #[test]
    fn execute_command_routes_args_and_tolerates_unknowns() {
        let mut host = host();
        let got = Rc::new(RefCell::new(Vec::new()));
        let sink = got.clone();
        host.register(Plugin::new("git", "Git", "1.0.0").on_mount(move |api| {
            let sink = sink.clone();
            api.register_command("stage", move |args| {
                sink.borrow_mut().extend(args.iter().cloned());
                Ok(())
            });
            Ok(())
        }));
        host.execute_command("git:stage", &[Value::from("src/main.rs")]);
        host.execute_command("git:missing", &[]);
        // Bare (un-namespaced) names never resolve.
        host.execute_command("stage", &[]);
        assert_eq!(*got.borrow(), vec![Value::from("src/main.rs")]);
    }

    #[test]
    fn completions_respect_triggers_and_config_ordering() {
        use crate::completion::{CompletionItem, CompletionKind, CompletionProvider};

        let mut host = host();
        host.register(
            Plugin::new("words", "Words", "1.0.0").with_completion_provider(
                CompletionProvider::new(ResourceId::new("words", "kw"), |_| {
                    vec![
                        CompletionItem::new("match", CompletionKind::Keyword).with_sort_order(2),
                        CompletionItem::new("let", CompletionKind::Keyword).with_sort_order(1),
                        CompletionItem::new("let", CompletionKind::Snippet).with_sort_order(5),
                    ]
                }),
            ),
        );
        host.register(
            Plugin::new("dots", "Dots", "1.0.0").with_completion_provider(
                CompletionProvider::new(ResourceId::new("dots", "members"), |_| {
                    vec![CompletionItem::new("len", CompletionKind::Function)]
                })
                .with_triggers(['.']),
            ),
        );

        // Manual invocation (no trigger) includes trigger-restricted providers.
        let plain = host.sorted_completions(None);
        let labels: Vec<&str> = plain.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, vec!["len", "let", "match"]);

        let dotted = host.completions(Some('.'));
        assert_eq!(dotted.len(), 4);
    }

    #[test]
    fn destroy_is_a_single_teardown_path() {
        let mut host = host();
        let wakes = Rc::new(Cell::new(0u32));
        let counter = wakes.clone();
        host.subscribe(move || counter.set(counter.get() + 1));
        host.register(Plugin::new("a", "A", "1.0.0").on_mount(|api| {
            api.add_diagnostic(Diagnostic::new(
                ResourceId::new("a", "1"),
                0,
                Severity::Hint,
                "hint",
            ));
            Ok(())
        }));
        host.register(Plugin::new("b", "B", "1.0.0"));
        host.destroy();

        assert!(host.plugin_ids().is_empty());
        let snapshot = host.snapshot();
        assert!(snapshot.plugins.is_empty());
        assert!(snapshot.diagnostics.is_empty());
        assert!(wakes.get() > 0);

        let before = wakes.get();
        host.with_session(|session| session.set_content("still usable"));
        host.register(Plugin::new("late", "Late", "1.0.0"));
        // Pre-destroy listeners are gone.
        assert_eq!(wakes.get(), before);
        assert!(host.is_enabled("late"));
    }

    #[tokio::test]
    async fn deferred_activation_runs_detached() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut host = host();
                let done = Rc::new(Cell::new(false));
                let flag = done.clone();
                host.register(Plugin::new("slow", "Slow", "1.0.0").on_activate(
                    move |_, _| {
                        let flag = flag.clone();
                        Ok(Activation::Deferred(Box::pin(async move {
                            tokio::task::yield_now().await;
                            flag.set(true);
                            Ok(())
                        })))
                    },
                ));
                // Enable returned before the future ran.
                assert!(host.is_enabled("slow"));
                assert!(!done.get());
                assert_eq!(host.pending_activations(), 1);

                for handle in host.spawn_deferred_activations() {
                    handle.await.unwrap();
                }
                assert!(done.get());
                assert_eq!(host.pending_activations(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn deferred_activation_failure_does_not_disable() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let mut host = host();
                host.register(Plugin::new("flaky", "Flaky", "1.0.0").on_activate(|_, _| {
                    Ok(Activation::Deferred(Box::pin(async {
                        anyhow::bail!("index build failed")
                    })))
                }));
                for handle in host.spawn_deferred_activations() {
                    handle.await.unwrap();
                }
                assert!(host.is_enabled("flaky"));
            })
            .await;
    }

    #[test]
    fn static_contributions_surface_and_vanish_on_disable() {
        use core_session::Formatter;

        use crate::contrib::{ContextMenuItem, Keybinding};

        let mut host = host();
        host.register(
            Plugin::new("fmt", "Formatter", "1.0.0")
                .with_keybinding(Keybinding::new(
                    ResourceId::new("fmt", "run-key"),
                    "ctrl+shift+f",
                    "run",
                ))
                .with_context_menu_item(ContextMenuItem::new(
                    ResourceId::new("fmt", "run-menu"),
                    "Format Document",
                    "run",
                ))
                .with_formatter(Formatter::new("pretty", |content: &str| {
                    content.trim().to_string()
                }))
                .on_mount(|api| {
                    api.register_command("run", |_| Ok(()));
                    Ok(())
                }),
        );

        let snapshot = host.snapshot();
        assert_eq!(snapshot.keybindings.len(), 1);
        // Bare command names are qualified with the owning plugin id.
        assert_eq!(snapshot.keybindings[0].command, "fmt:run");
        assert_eq!(snapshot.context_menu.len(), 1);
        assert_eq!(snapshot.context_menu[0].command, "fmt:run");

        host.disable("fmt");
        let snapshot = host.snapshot();
        assert!(snapshot.keybindings.is_empty());
        assert!(snapshot.context_menu.is_empty());
    }

    #[test]
    fn formatter_delegation_reaches_the_session() {
        #[derive(Default)]
        struct ProbeSession {
            inner: MemorySession,
            formatter_ids: Rc<RefCell<Vec<String>>>,
        }

        impl core_session::DocumentSession for ProbeSession {
            fn content(&self) -> String {
                self.inner.content()
            }
            fn set_content(&mut self, text: &str) {
                self.inner.set_content(text);
            }
            fn selection(&self) -> core_session::SelectionRange {
                self.inner.selection()
            }
            fn set_selection(&mut self, selection: core_session::SelectionRange) {
                self.inner.set_selection(selection);
            }
            fn cursor(&self) -> core_session::CursorPos {
                self.inner.cursor()
            }
            fn set_cursor(&mut self, cursor: core_session::CursorPos) {
                self.inner.set_cursor(cursor);
            }
            fn file_info(&self) -> core_session::FileInfo {
                self.inner.file_info()
            }
            fn set_language(&mut self, language: &str) {
                self.inner.set_language(language);
            }
            fn theme(&self) -> String {
                self.inner.theme()
            }
            fn set_theme(&mut self, theme: &str) {
                self.inner.set_theme(theme);
            }
            fn state_value(&self) -> Value {
                self.inner.state_value()
            }
            fn show_message(&mut self, level: core_session::MessageLevel, text: &str) {
                self.inner.show_message(level, text);
            }
            fn register_formatter(&mut self, formatter: core_session::Formatter) {
                self.formatter_ids.borrow_mut().push(formatter.id.clone());
                self.inner.register_formatter(formatter);
            }
            fn unregister_formatter(&mut self, id: &str) -> bool {
                self.formatter_ids.borrow_mut().retain(|f| f != id);
                self.inner.unregister_formatter(id)
            }
        }

        let ids = Rc::new(RefCell::new(Vec::new()));
        let session = ProbeSession {
            inner: MemorySession::new(),
            formatter_ids: ids.clone(),
        };
        let mut host = PluginHost::new(Box::new(session));
        host.register(Plugin::new("fmt", "Formatter", "1.0.0").with_formatter(
            core_session::Formatter::new("pretty", |content: &str| content.trim().to_string()),
        ));
        assert_eq!(*ids.borrow(), vec!["fmt:pretty".to_string()]);

        host.disable("fmt");
        assert!(ids.borrow().is_empty());
    }

    #[test]
    fn activation_token_dies_on_disable() {
        let mut host = host();
        let token_slot: Rc<RefCell<Option<ActivationToken>>> = Rc::new(RefCell::new(None));
        let slot = token_slot.clone();
        host.register(Plugin::new("p", "P", "1.0.0").on_activate(move |_, token| {
            *slot.borrow_mut() = Some(token);
            Ok(Activation::Ready)
        }));
        let token = token_slot.borrow().clone().unwrap();
        assert!(token.is_live());
        host.disable("p");
        assert!(!token.is_live());
        // A fresh enable mints a fresh token.
        host.enable("p");
        assert!(!token.is_live());
        assert!(token_slot.borrow().clone().unwrap().is_live());
    }
}
