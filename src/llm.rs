//! Chat-model provider abstraction
//!
//! Provides a common interface for the language-model endpoint plus a
//! logging wrapper. The concrete provider speaks the OpenAI-compatible
//! chat-completions dialect.

mod error;
mod openai;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAiClient;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ModelInfo, Role, ToolCallRequest, ToolDefinition,
};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for chat models.
///
/// The model id travels inside the request, so one service instance can
/// answer for every model its endpoint hosts; tests swap in scripted
/// implementations.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Make a completion request.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Logging wrapper for chat models
pub struct LoggingModel {
    inner: Arc<dyn ChatModel>,
}

impl LoggingModel {
    pub fn new(inner: Arc<dyn ChatModel>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatModel for LoggingModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    tool_calls = response.tool_calls.len(),
                    text_len = response.text.len(),
                    "chat completion finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "chat completion failed"
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedModel;

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                text: "canned".into(),
                tool_calls: vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_logging_wrapper_passes_through() {
        let model = LoggingModel::new(Arc::new(CannedModel));
        let request = ChatRequest {
            model: "test".into(),
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
            temperature: None,
        };
        let response = model.complete(&request).await.unwrap();
        assert_eq!(response.text, "canned");
    }
}
