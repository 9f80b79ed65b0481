//! Name-keyed tool registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::Tool;

/// Registry mapping tool names to implementations. Registration is
/// idempotent by name: re-registering overwrites the previous entry.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Mutex<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.get(name).cloned()
    }

    pub fn count(&self) -> usize {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.len()
    }

    pub fn list_names(&self) -> Vec<String> {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }
}
