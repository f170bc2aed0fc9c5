//! The tool registry: a frozen, name-keyed lookup table.

use std::collections::HashMap;

use tracing::warn;

use crate::descriptor::ToolDescriptor;

/// Registry of tool descriptors. Built up during boot, then
/// [`ToolRegistry::freeze`]s so no tool can be added or removed once the
/// Dependencies Container starts minting `ExecutionContext`s from it.
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
    frozen: bool,
}

impl ToolRegistry {
    /// An empty, unfrozen registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            frozen: false,
        }
    }

    /// Register a descriptor. A no-op (with a logged warning) once frozen.
    pub fn register(&mut self, descriptor: ToolDescriptor) {
        if self.frozen {
            warn!(tool = descriptor.name, "attempted to register a tool after the registry was frozen, ignored");
            return;
        }
        self.tools.insert(descriptor.name.to_string(), descriptor);
    }

    /// Prevent further registration. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the registry has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// All registered tool names, for whitelist validation and LLM
    /// tool-definition export.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::ReadFileTool;
    use serde_json::json;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("read_file", "reads a file", json!({"type": "object"}), ReadFileTool)
    }

    #[test]
    fn register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(descriptor());
        assert!(registry.get("read_file").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn frozen_registry_rejects_new_registrations() {
        let mut registry = ToolRegistry::new();
        registry.freeze();
        registry.register(descriptor());
        assert!(registry.get("read_file").is_none());
        assert_eq!(registry.len(), 0);
    }
}
