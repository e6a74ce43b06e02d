//! Agent tools and the tool registry.
//!
//! Tools never fail from the agent's point of view: an implementation turns
//! its own errors into a textual result so the agent can keep reasoning.

pub mod search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use search::{SEARCH_TOOL_NAME, SearchConfig, SearchTool};

/// Tool names the built-in registry knows how to provide.
pub const BUILTIN_TOOLS: &[&str] = &[SEARCH_TOOL_NAME];

/// A capability an agent can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the agent uses in `Action:` lines.
    fn name(&self) -> &str;

    /// One-line description shown to the agent.
    fn description(&self) -> &str;

    /// Run the tool with free-text input and return the observation.
    async fn run(&self, input: &str) -> String;
}

// Compile-time assertion: Tool must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

/// A collection of registered [`Tool`] implementations, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tools.
    pub fn builtin(search: SearchConfig) -> Self {
        let mut registry = Self::new();
        registry.register(SearchTool::new(search));
        registry
    }

    /// Register a tool under [`Tool::name`], returning any tool it replaces.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Option<Arc<dyn Tool>> {
        self.register_shared(Arc::new(tool))
    }

    /// Register a tool the caller keeps a handle to.
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        self.tools.insert(name, tool)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    /// Sorted names of all registered tools.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
