//! Immutable aggregate snapshot consumed by the rendering layer.
//!
//! The bridge is pull-based: a rendering layer subscribes to invalidation
//! (no payload) and re-pulls [`HostSnapshot`] when woken. Snapshots are
//! copy-on-write: the host caches one `Rc<HostSnapshot>` and hands out
//! clones of the same allocation until the next mutation, so consumers can
//! compare previous/next by `Rc::ptr_eq` to answer "did anything change" in
//! constant time. A previously returned snapshot is never mutated in place.

use core_resources::{CodeLens, Diagnostic, GutterDecoration, InlineAnnotation, InlineDecoration};

use crate::contrib::{ContextMenuItem, Keybinding};
use crate::panel::PanelPosition;

/// Registered plugin metadata as seen by the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub category: String,
    pub depends_on: Vec<String>,
    pub enabled: bool,
}

/// Panel metadata without the render closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelInfo {
    /// Rendered `owner:local` id, usable with `PluginHost::render_panel`.
    pub id: String,
    pub title: String,
    pub position: PanelPosition,
    pub default_size: u16,
    pub open: bool,
}

/// One immutable view of everything plugins currently contribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    /// Monotonic mutation counter; strictly increases across snapshots.
    pub version: u64,
    /// Registration order.
    pub plugins: Vec<PluginInfo>,
    /// Ids of enabled plugins, in registration order.
    pub enabled_plugins: Vec<String>,
    pub decorations: Vec<InlineDecoration>,
    pub gutter_decorations: Vec<GutterDecoration>,
    pub code_lenses: Vec<CodeLens>,
    pub annotations: Vec<InlineAnnotation>,
    pub diagnostics: Vec<Diagnostic>,
    pub keybindings: Vec<Keybinding>,
    pub context_menu: Vec<ContextMenuItem>,
    pub panels: Vec<PanelInfo>,
    /// Rendered ids of open panels, sorted.
    pub open_panels: Vec<String>,
    /// Registered command ids, registration order.
    pub commands: Vec<String>,
}

impl HostSnapshot {
    /// True when any resource list still carries an entry owned by `owner`.
    /// Teardown tests use this to assert clear-by-owner completeness.
    pub fn owns_anything(&self, owner: &str) -> bool {
        self.decorations.iter().any(|d| d.id.owner() == owner)
            || self.gutter_decorations.iter().any(|d| d.id.owner() == owner)
            || self.code_lenses.iter().any(|l| l.id.owner() == owner)
            || self.annotations.iter().any(|a| a.id.owner() == owner)
            || self.diagnostics.iter().any(|d| d.id.owner() == owner)
            || self.keybindings.iter().any(|k| k.id.owner() == owner)
            || self.context_menu.iter().any(|c| c.id.owner() == owner)
            || self.panels.iter().any(|p| {
                core_resources::ResourceId::parse(&p.id)
                    .is_some_and(|id| id.owner() == owner)
            })
            || self.commands.iter().any(|c| {
                core_resources::ResourceId::parse(c).is_some_and(|id| id.owner() == owner)
            })
    }
}
