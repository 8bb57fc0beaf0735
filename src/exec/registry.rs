//! Command Registry
//!
//! Name → command-handle table. Registration replaces; lookup order for
//! the interpreter is builtins, then shell functions, then this table.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::exec::context::Command;

pub struct CommandRegistry {
    commands: Mutex<IndexMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(IndexMap::new()),
        }
    }

    /// Register under the command's own name, replacing any previous
    /// registration.
    pub fn register(&self, command: Arc<dyn Command>) {
        self.register_as(command.name(), command);
    }

    /// Register under an explicit name (aliased binaries).
    pub fn register_as(&self, name: &str, command: Arc<dyn Command>) {
        self.commands
            .lock()
            .unwrap()
            .insert(name.to_string(), command);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.lock().unwrap().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) {
        self.commands.lock().unwrap().shift_remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.lock().unwrap().contains_key(name)
    }

    /// Registered names in registration order.
    pub fn list(&self) -> Vec<String> {
        self.commands.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::context::{CommandContext, CommandError};
    use async_trait::async_trait;

    struct FakeCommand(&'static str, i32);

    #[async_trait]
    impl Command for FakeCommand {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, _ctx: CommandContext) -> Result<i32, CommandError> {
            Ok(self.1)
        }
    }

    #[test]
    fn test_register_resolve() {
        let registry = CommandRegistry::new();
        registry.register(Arc::new(FakeCommand("one", 0)));
        assert!(registry.contains("one"));
        assert!(registry.resolve("one").is_some());
        assert!(registry.resolve("two").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let registry = CommandRegistry::new();
        registry.register(Arc::new(FakeCommand("cmd", 1)));
        registry.register(Arc::new(FakeCommand("cmd", 2)));
        assert_eq!(registry.list(), vec!["cmd"]);
    }

    #[test]
    fn test_unregister() {
        let registry = CommandRegistry::new();
        registry.register(Arc::new(FakeCommand("gone", 0)));
        registry.unregister("gone");
        assert!(!registry.contains("gone"));
    }

    #[test]
    fn test_list_in_registration_order() {
        let registry = CommandRegistry::new();
        registry.register(Arc::new(FakeCommand("zeta", 0)));
        registry.register(Arc::new(FakeCommand("alpha", 0)));
        assert_eq!(registry.list(), vec!["zeta", "alpha"]);
    }
}
