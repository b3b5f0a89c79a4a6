//! Command registry with owner namespacing.
//!
//! Commands registered through the capability facade are namespaced
//! `<ownerId>:<name>` automatically, so two plugins can both register a
//! `format` command without colliding, and teardown can clear a plugin's
//! commands by owner. Invocation is by full identifier only; an unknown
//! identifier (including a bare un-namespaced name) logs a warning and
//! returns; it is never an error, per the host's no-propagation policy.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::warn;

/// Separator between the owner and the command name.
pub const NAMESPACE_SEP: char = ':';

/// `owner` + `name` joined into a full command id.
pub fn namespaced(owner: &str, name: &str) -> String {
    format!("{owner}{NAMESPACE_SEP}{name}")
}

/// Qualify a possibly-local command reference: already-namespaced ids pass
/// through verbatim, bare names gain the owner prefix. Used when static
/// contributions (keybindings, menu items) reference their own commands by
/// local name.
pub fn qualify(owner: &str, command: &str) -> String {
    if command.contains(NAMESPACE_SEP) {
        command.to_string()
    } else {
        namespaced(owner, command)
    }
}

pub(crate) type CommandFn = Box<dyn FnMut(&[Value]) -> anyhow::Result<()>>;
pub(crate) type SharedCommandFn = Rc<RefCell<CommandFn>>;

pub(crate) struct CommandEntry {
    pub id: String,
    pub owner: String,
    pub handler: SharedCommandFn,
}

/// Insertion-ordered command table. At most one handler per full id.
#[derive(Default)]
pub(crate) struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl CommandRegistry {
    /// Register `owner:name`; duplicate ids are a logged no-op. Returns the
    /// full id on success.
    pub fn register(&mut self, owner: &str, name: &str, handler: CommandFn) -> Option<String> {
        let id = namespaced(owner, name);
        if self.entries.iter().any(|e| e.id == id) {
            warn!(target: "plugin.command", command = %id, "duplicate_command_ignored");
            return None;
        }
        self.entries.push(CommandEntry {
            id: id.clone(),
            owner: owner.to_string(),
            handler: Rc::new(RefCell::new(handler)),
        });
        Some(id)
    }

    pub fn lookup(&self, id: &str) -> Option<SharedCommandFn> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.handler.clone())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn clear_owner(&mut self, owner: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.owner != owner);
        before - self.entries.len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Invoke a handler previously cloned out of the registry. The handler cell
/// is borrowed only for the call; a command recursively invoking itself is
/// refused with a warning instead of aborting on a double borrow.
pub(crate) fn invoke(id: &str, handler: &SharedCommandFn, args: &[Value]) {
    let Ok(mut handler) = handler.try_borrow_mut() else {
        warn!(target: "plugin.command", command = %id, "recursive_invocation_ignored");
        return;
    };
    if let Err(err) = (*handler)(args) {
        warn!(target: "plugin.command", command = %id, error = %format!("{err:#}"), "command_failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_leaves_namespaced_ids_alone() {
        assert_eq!(namespaced("git", "blame"), "git:blame");
        assert_eq!(qualify("git", "blame"), "git:blame");
        assert_eq!(qualify("git", "other:cmd"), "other:cmd");
    }

    #[test]
    fn duplicate_registration_keeps_first_handler() {
        let mut reg = CommandRegistry::default();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let h = hits.clone();
        assert_eq!(
            reg.register("p", "run", Box::new(move |_| {
                h.borrow_mut().push("first");
                Ok(())
            })),
            Some("p:run".to_string())
        );
        let h = hits.clone();
        assert_eq!(
            reg.register("p", "run", Box::new(move |_| {
                h.borrow_mut().push("second");
                Ok(())
            })),
            None
        );
        let handler = reg.lookup("p:run").expect("registered");
        invoke("p:run", &handler, &[]);
        assert_eq!(*hits.borrow(), vec!["first"]);
    }

    #[test]
    fn clear_owner_removes_only_that_owner() {
        let mut reg = CommandRegistry::default();
        reg.register("a", "one", Box::new(|_| Ok(())));
        reg.register("b", "one", Box::new(|_| Ok(())));
        assert_eq!(reg.clear_owner("a"), 1);
        assert!(reg.lookup("a:one").is_none());
        assert!(reg.lookup("b:one").is_some());
    }

    #[test]
    fn failing_handler_is_contained() {
        let mut reg = CommandRegistry::default();
        reg.register("p", "boom", Box::new(|_| anyhow::bail!("kaput")));
        let handler = reg.lookup("p:boom").expect("registered");
        // Must not panic or propagate.
        invoke("p:boom", &handler, &[]);
    }
}
