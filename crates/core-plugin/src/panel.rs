//! Side/bottom panel descriptors.
//!
//! Panels are registered but not shown until toggled: the open-panel set is
//! independent membership, keyed by the rendered `owner:local` id so the
//! rendering layer can address panels without holding descriptor handles.
//! The render closure receives the owning plugin's capability facade and
//! returns the panel body as text; layout and painting are the rendering
//! layer's concern.

use std::fmt;
use std::rc::Rc;

use core_resources::{OwnedResource, ResourceId};

use crate::api::EditorApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPosition {
    Side,
    Bottom,
}

pub type PanelRender = Rc<dyn Fn(&mut EditorApi) -> String>;

/// Default size in rows (bottom) or columns (side) when none is declared.
pub const DEFAULT_PANEL_SIZE: u16 = 30;

#[derive(Clone)]
pub struct PanelDescriptor {
    pub id: ResourceId,
    pub title: String,
    pub position: PanelPosition,
    pub default_size: u16,
    pub render: PanelRender,
}

impl PanelDescriptor {
    pub fn new(
        id: ResourceId,
        title: impl Into<String>,
        position: PanelPosition,
        render: impl Fn(&mut EditorApi) -> String + 'static,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            position,
            default_size: DEFAULT_PANEL_SIZE,
            render: Rc::new(render),
        }
    }

    pub fn with_default_size(mut self, size: u16) -> Self {
        self.default_size = size;
        self
    }
}

impl OwnedResource for PanelDescriptor {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

impl fmt::Debug for PanelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelDescriptor")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("position", &self.position)
            .field("default_size", &self.default_size)
            .finish_non_exhaustive()
    }
}
