//! Plugin definition: identity, lifecycle hooks, static contributions.
//!
//! A [`Plugin`] is a unit of behavior authored independently of the host: a
//! stable identifier, human-readable metadata, optional lifecycle and event
//! hooks, and static contribution lists applied once at enable time through
//! the same facade path dynamic registrations use. The host application
//! supplies plugins as an ordered sequence and owns their lifetime; any
//! internal plugin state lives inside the hook closures.
//!
//! Hook failure model: hooks return `anyhow::Result<()>` and the host logs
//! an `Err` with the plugin id and hook name without propagating it; one
//! misbehaving plugin never prevents another's hooks from running.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use core_session::{Formatter, SelectionRange};

use crate::api::EditorApi;
use crate::completion::CompletionProvider;
use crate::contrib::{ContextMenuItem, Keybinding};
use crate::panel::PanelDescriptor;

pub type HookFn = Box<dyn FnMut(&mut EditorApi) -> anyhow::Result<()>>;
pub type ActivateFn = Box<dyn FnMut(&mut EditorApi, ActivationToken) -> anyhow::Result<Activation>>;
pub type ContentHookFn = Box<dyn FnMut(&mut EditorApi, &str) -> anyhow::Result<()>>;
pub type SelectionHookFn = Box<dyn FnMut(&mut EditorApi, SelectionRange) -> anyhow::Result<()>>;

/// Deferred activation future. `!Send`: it runs as a local task on the
/// host's single-threaded runtime.
pub type ActivationFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>>>>;

/// Outcome of `on_activate`. Enable never blocks on `Deferred`: the future
/// is queued and later detached via `PluginHost::spawn_deferred_activations`,
/// its result used only for logging.
pub enum Activation {
    Ready,
    Deferred(ActivationFuture),
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Ready => write!(f, "Ready"),
            Activation::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

/// Liveness flag handed to `on_activate`. The host cancels it when the
/// plugin is disabled, so a long-running activation can check whether it is
/// still the active session before mutating state.
#[derive(Debug, Clone)]
pub struct ActivationToken {
    live: Rc<Cell<bool>>,
}

impl ActivationToken {
    pub(crate) fn new() -> Self {
        Self {
            live: Rc::new(Cell::new(true)),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    pub(crate) fn cancel(&self) {
        self.live.set(false);
    }
}

#[derive(Default)]
pub(crate) struct PluginHooks {
    pub on_init: Option<HookFn>,
    pub on_mount: Option<HookFn>,
    pub on_activate: Option<ActivateFn>,
    pub on_deactivate: Option<HookFn>,
    pub on_unmount: Option<HookFn>,
    pub on_content_change: Option<ContentHookFn>,
    pub on_selection_change: Option<SelectionHookFn>,
    pub on_save: Option<ContentHookFn>,
    pub on_language_change: Option<ContentHookFn>,
}

/// An independently authored feature module. Construct with [`Plugin::new`]
/// and chain builder methods; hand the result to `PluginHost::register`.
pub struct Plugin {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) category: String,
    pub(crate) default_enabled: bool,
    pub(crate) depends_on: Vec<String>,
    pub(crate) hooks: PluginHooks,
    pub(crate) keybindings: Vec<Keybinding>,
    pub(crate) context_menu: Vec<ContextMenuItem>,
    pub(crate) formatters: Vec<Formatter>,
    pub(crate) panels: Vec<PanelDescriptor>,
    pub(crate) completion_providers: Vec<CompletionProvider>,
}

impl Plugin {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            category: String::from("general"),
            default_enabled: true,
            depends_on: Vec::new(),
            hooks: PluginHooks::default(),
            keybindings: Vec::new(),
            context_menu: Vec::new(),
            formatters: Vec::new(),
            panels: Vec::new(),
            completion_providers: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn default_enabled(&self) -> bool {
        self.default_enabled
    }

    /// Declared dependency ids. Recorded and surfaced in the snapshot only;
    /// load order is not enforced from them.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    pub fn with_depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_init(mut self, hook: impl FnMut(&mut EditorApi) -> anyhow::Result<()> + 'static) -> Self {
        self.hooks.on_init = Some(Box::new(hook));
        self
    }

    pub fn on_mount(mut self, hook: impl FnMut(&mut EditorApi) -> anyhow::Result<()> + 'static) -> Self {
        self.hooks.on_mount = Some(Box::new(hook));
        self
    }

    pub fn on_activate(
        mut self,
        hook: impl FnMut(&mut EditorApi, ActivationToken) -> anyhow::Result<Activation> + 'static,
    ) -> Self {
        self.hooks.on_activate = Some(Box::new(hook));
        self
    }

    pub fn on_deactivate(
        mut self,
        hook: impl FnMut(&mut EditorApi) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.on_deactivate = Some(Box::new(hook));
        self
    }

    pub fn on_unmount(
        mut self,
        hook: impl FnMut(&mut EditorApi) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.on_unmount = Some(Box::new(hook));
        self
    }

    pub fn on_content_change(
        mut self,
        hook: impl FnMut(&mut EditorApi, &str) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.on_content_change = Some(Box::new(hook));
        self
    }

    pub fn on_selection_change(
        mut self,
        hook: impl FnMut(&mut EditorApi, SelectionRange) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.on_selection_change = Some(Box::new(hook));
        self
    }

    pub fn on_save(
        mut self,
        hook: impl FnMut(&mut EditorApi, &str) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.on_save = Some(Box::new(hook));
        self
    }

    pub fn on_language_change(
        mut self,
        hook: impl FnMut(&mut EditorApi, &str) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.on_language_change = Some(Box::new(hook));
        self
    }

    pub fn with_keybinding(mut self, keybinding: Keybinding) -> Self {
        self.keybindings.push(keybinding);
        self
    }

    pub fn with_context_menu_item(mut self, item: ContextMenuItem) -> Self {
        self.context_menu.push(item);
        self
    }

    /// Formatter contribution with a plugin-local id; the facade namespaces
    /// it to `<pluginId>:<id>` before delegating to the session.
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn with_panel(mut self, panel: PanelDescriptor) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn with_completion_provider(mut self, provider: CompletionProvider) -> Self {
        self.completion_providers.push(provider);
        self
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("category", &self.category)
            .field("default_enabled", &self.default_enabled)
            .field("depends_on", &self.depends_on)
            .field("keybindings", &self.keybindings.len())
            .field("context_menu", &self.context_menu.len())
            .field("formatters", &self.formatters.len())
            .field("panels", &self.panels.len())
            .field("completion_providers", &self.completion_providers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_plugin_defaults_to_enabled_general() {
        let plugin = Plugin::new("lint", "Linter", "1.0.0");
        assert!(plugin.default_enabled());
        assert_eq!(plugin.category(), "general");
        assert!(plugin.depends_on().is_empty());
    }

    #[test]
    fn builder_overrides_metadata() {
        let plugin = Plugin::new("hints", "Inline Hints", "0.2.0")
            .with_category("analysis")
            .with_default_enabled(false)
            .with_depends_on(["lint"]);
        assert!(!plugin.default_enabled());
        assert_eq!(plugin.category(), "analysis");
        assert_eq!(plugin.depends_on(), ["lint".to_string()]);
    }

    #[test]
    fn activation_token_flips_once_cancelled() {
        let token = ActivationToken::new();
        let observer = token.clone();
        assert!(observer.is_live());
        token.cancel();
        assert!(!observer.is_live());
    }
}
