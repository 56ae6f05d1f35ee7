//! Sandboxed code-execution tool

use super::{Tool, ToolContext, ToolOutput};
use crate::sandbox::{Executor, DEFAULT_DENYLIST};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One sandbox executor per session, created lazily on first use.
///
/// Scratch state lives in the executor, so a session behaves like a
/// stateful REPL across turns while sessions stay fully isolated from
/// each other. The per-executor async mutex serializes concurrent calls
/// that race on the same session.
#[derive(Clone)]
pub struct SessionExecutors {
    denylist: Arc<Vec<String>>,
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<Executor>>>>>,
}

impl SessionExecutors {
    pub fn new(denylist: Vec<String>) -> Self {
        Self {
            denylist: Arc::new(denylist),
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_default_denylist() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()).collect())
    }

    fn get(&self, session_id: &str) -> Arc<tokio::sync::Mutex<Executor>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(Executor::new(
                    self.denylist.iter().cloned(),
                )))
            })
            .clone()
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteCodeInput {
    code: String,
}

/// Tool that runs snippets in the sandbox
pub struct ExecuteCodeTool {
    executors: SessionExecutors,
}

impl ExecuteCodeTool {
    pub fn new(executors: SessionExecutors) -> Self {
        Self { executors }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &'static str {
        "execute_code"
    }

    fn description(&self) -> String {
        r"Use it for executing code, performing calculations, or creating plots.
The snippet language supports numbers, strings, lists, variables, and the
operators + - * / % ^ (power). Separate statements with newlines or `;`.
Available bindings:
- math.sin/cos/tan/sqrt/log/exp/floor/ceil/round/pow and math.pi/math.e
- plot.line(xs, ys), plot.scatter(xs, ys), plot.title(text) — a plotted
  figure is returned as an inline image
- b64.encode(text), b64.decode(text)
- abs, min, max, len, str, sum, range
Variables persist across calls within the same conversation. The value of
the last bare expression is returned as the result."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["code"],
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The snippet to execute"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: ExecuteCodeInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let executor = self.executors.get(&ctx.session_id);
        let mut executor = executor.lock().await;
        match executor.execute(&input.code).into_tool_text() {
            Ok(text) => ToolOutput::success(text),
            Err(reason) => ToolOutput::error(format!("Error: {reason}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::INLINE_IMAGE_PREFIX;

    fn tool() -> ExecuteCodeTool {
        ExecuteCodeTool::new(SessionExecutors::with_default_denylist())
    }

    #[tokio::test]
    async fn test_runs_arithmetic() {
        let output = tool()
            .run(json!({"code": "2+2"}), ToolContext::new("s1"))
            .await;
        assert!(output.success);
        assert_eq!(output.output, "4");
    }

    #[tokio::test]
    async fn test_denied_code_reports_error() {
        let output = tool()
            .run(json!({"code": "open('/etc/passwd')"}), ToolContext::new("s1"))
            .await;
        assert!(!output.success);
        assert!(output.output.contains("not allowed"));
    }

    #[tokio::test]
    async fn test_state_isolated_per_session() {
        let tool = tool();
        tool.run(json!({"code": "x = 7"}), ToolContext::new("alpha"))
            .await;

        // Same session sees the binding...
        let same = tool.run(json!({"code": "x"}), ToolContext::new("alpha")).await;
        assert!(same.success);
        assert_eq!(same.output, "7");

        // ...a different session does not.
        let other = tool.run(json!({"code": "x"}), ToolContext::new("beta")).await;
        assert!(!other.success);
        assert!(other.output.contains("not defined"));
    }

    #[tokio::test]
    async fn test_plot_returns_inline_image() {
        let output = tool()
            .run(
                json!({"code": "plot.line([0, 1, 2], [0, 1, 4])"}),
                ToolContext::new("s1"),
            )
            .await;
        assert!(output.success);
        assert!(output.output.starts_with(INLINE_IMAGE_PREFIX));
    }

    #[tokio::test]
    async fn test_missing_code_field() {
        let output = tool().run(json!({}), ToolContext::new("s1")).await;
        assert!(!output.success);
        assert!(output.output.contains("Invalid input"));
    }
}
