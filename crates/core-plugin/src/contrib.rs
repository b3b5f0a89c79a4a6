//! Static declarative contributions: keybindings and context-menu items.
//!
//! Both are owned resources stored in the shared [`core_resources::ResourceStore`]
//! so enable/disable teardown reuses the same clear-by-owner path as
//! decorations and diagnostics. Their `command` field may name a plugin-local
//! command; the capability facade qualifies it with the owning plugin id at
//! registration time (see [`crate::command::qualify`]).

use core_resources::{OwnedResource, ResourceId};

/// Keybinding contribution: a key chord string (e.g. `"ctrl+shift+p"`)
/// mapped to a command id. Chord syntax is interpreted by the host
/// application's input layer, not by the plugin host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybinding {
    pub id: ResourceId,
    pub keys: String,
    pub command: String,
    pub description: Option<String>,
}

impl Keybinding {
    pub fn new(id: ResourceId, keys: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id,
            keys: keys.into(),
            command: command.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl OwnedResource for Keybinding {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// Context-menu contribution: a labeled entry invoking a command, optionally
/// grouped for menu layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenuItem {
    pub id: ResourceId,
    pub label: String,
    pub command: String,
    pub group: Option<String>,
}

impl ContextMenuItem {
    pub fn new(id: ResourceId, label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            command: command.into(),
            group: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

impl OwnedResource for ContextMenuItem {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_optional_fields() {
        let kb = Keybinding::new(ResourceId::new("git", "blame-key"), "ctrl+b", "blame")
            .with_description("Toggle blame");
        assert_eq!(kb.description.as_deref(), Some("Toggle blame"));

        let item = ContextMenuItem::new(ResourceId::new("git", "blame-menu"), "Blame", "blame")
            .with_group("scm");
        assert_eq!(item.group.as_deref(), Some("scm"));
        assert_eq!(item.id.owner(), "git");
    }
}
