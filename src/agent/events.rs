//! Events emitted by the agent loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of agent progress, emitted strictly in production order.
///
/// Exactly one SSE frame is written per event; nothing is batched or
/// split across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The model proposed a tool call; emitted before the tool runs.
    ToolInvoked { name: String, args: Value },
    /// A tool finished; carries the textual result fed back to the model.
    ToolResult { name: String, output: String },
    /// Non-empty assistant text. Whitespace-only text is never emitted.
    AssistantText { text: String },
    /// Terminal failure: exactly one of these ends an erroring stream.
    Error { message: String },
}
