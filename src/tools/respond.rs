//! No-op respond tool for restricted (non-advanced) requests
//!
//! The restricted registry exposes only this tool, so a model serving a
//! non-advanced request has nothing it can actually do besides answer.

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde_json::{json, Value};

/// The single tool of the restricted registry.
pub struct RespondTool;

#[async_trait]
impl Tool for RespondTool {
    fn name(&self) -> &'static str {
        "respond"
    }

    fn description(&self) -> String {
        "just respond normally".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Ignored; reply directly to the user instead"
                }
            }
        })
    }

    async fn run(&self, _input: Value, _ctx: ToolContext) -> ToolOutput {
        ToolOutput::success("Reply to the user.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_respond_is_a_noop() {
        let output = RespondTool
            .run(json!({"message": "hello"}), ToolContext::new("s1"))
            .await;
        assert!(output.success);
        assert_eq!(output.output, "Reply to the user.");
    }

    #[tokio::test]
    async fn test_respond_tolerates_empty_input() {
        let output = RespondTool.run(json!({}), ToolContext::new("s1")).await;
        assert!(output.success);
    }
}
