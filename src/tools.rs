//! Tool implementations for the assistant
//!
//! Tools are stateless singletons; per-call context arrives via
//! `ToolContext`. Registries are assembled once at service construction
//! and never mutated afterwards — the restricted registry is how
//! non-advanced requests are structurally cut off from the real tools.

mod code;
mod fetch;
mod respond;
mod search;

pub use code::{ExecuteCodeTool, SessionExecutors};
pub use fetch::FetchUrlTool;
pub use respond::RespondTool;
pub use search::WebSearchTool;

use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// All context needed for a tool invocation.
///
/// Created fresh for each tool call. Tools derive every per-call fact
/// from this struct rather than carrying their own state.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The session whose conversation this tool runs inside. Keys the
    /// sandbox executor, so snippets see their own session's scratch.
    pub session_id: String,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

/// Trait for tools the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for the model's tool-selection step
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool with all context provided via `ToolContext`
    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput;
}

/// Immutable collection of tools available to a request
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Full registry for advanced requests: search, fetch, execute.
    pub fn standard(num_search_results: usize, executors: SessionExecutors) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(WebSearchTool::new(num_search_results)),
            Arc::new(FetchUrlTool::new()),
            Arc::new(ExecuteCodeTool::new(executors)),
        ];
        Self { tools }
    }

    /// Registry with an explicit tool set, for scripted-loop tests.
    #[cfg(test)]
    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Restricted registry: a single no-op tool. Selecting this registry
    /// is the policy gate that keeps search/fetch/execute away from the
    /// model entirely, not just discouraged.
    pub fn restricted() -> Self {
        Self {
            tools: vec![Arc::new(RespondTool)],
        }
    }

    /// Get all tool definitions for the model, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name with context
    pub async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutput> {
        for tool in &self.tools {
            if tool.name() == name {
                return Some(tool.run(input, ctx).await);
            }
        }
        None
    }
}
