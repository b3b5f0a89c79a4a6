//! Per-document plugin host: lifecycle, capability facade, and dispatch.
//!
//! A [`PluginHost`] owns everything a set of plugins contributes to one
//! editable document: resource stores (decorations, gutter marks, code
//! lenses, annotations, diagnostics), capability registries (completion
//! providers, panels, commands), event subscriptions, and disposables. The
//! host application constructs one host per session and drives it
//! explicitly; there is no global registry.
//!
//! Plugins never touch host internals directly. Each enabled plugin gets an
//! [`EditorApi`] facade pre-bound to its id, which tags every resource it
//! creates so the host can sweep all of it atomically on disable. Plugin
//! callbacks are fault-isolated at every boundary: a failing hook is logged
//! (target `plugin.host`) with the plugin id and hook name, and the host
//! carries on.
//!
//! The rendering layer consumes host state through the pull-based snapshot
//! bridge: subscribe for no-payload invalidation wakes, then re-pull
//! [`PluginHost::snapshot`], which is cached and cheap when nothing changed.
//!
//! Design Notes:
//! - Single-threaded by construction: shared state is `Rc<RefCell<..>>`,
//!   callbacks are `!Send`. Deferred activation futures run on a tokio
//!   `LocalSet` via `spawn_local`.
//! - Handles are cloned out of the shared state before any plugin callback
//!   runs, so callbacks may re-enter the facade freely. The one guarded
//!   cycle is a command invoking itself, which is dropped with a log line.
//! - Disposables capture `Weak` references back to the state, so a plugin
//!   holding its `Subscription` past host teardown cannot leak the host.

pub mod api;
pub mod command;
pub mod completion;
pub mod config;
pub mod contrib;
pub mod host;
pub mod panel;
pub mod plugin;
pub mod snapshot;
mod state;

pub use api::{EditorApi, Subscription};
pub use command::NAMESPACE_SEP;
pub use completion::{
    CompletionContext, CompletionItem, CompletionKind, CompletionProvider,
};
pub use config::{ConfigError, HostConfig};
pub use contrib::{ContextMenuItem, Keybinding};
pub use host::{DeferredActivation, PluginHost};
pub use panel::{PanelDescriptor, PanelPosition};
pub use plugin::{Activation, ActivationToken, Plugin};
pub use snapshot::{HostSnapshot, PanelInfo, PluginInfo};
