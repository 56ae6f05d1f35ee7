//! OpenAI-compatible provider implementation
//!
//! Talks to any endpoint speaking the chat-completions dialect (OpenAI,
//! Ollama, vLLM, gateways). The model id travels per request, so one
//! client serves every model the endpoint hosts.

use super::types::{ChatMessage, ChatRequest, ChatResponse, ModelInfo, ToolCallRequest};
use super::{ChatModel, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat service.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// `base_url` is the API root, e.g. `http://localhost:11434/v1`.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// List the model ids the endpoint advertises.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        let listing: ModelListing = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("failed to parse model listing: {e}")))?;

        Ok(listing
            .data
            .into_iter()
            .map(|entry| ModelInfo {
                id: entry.id,
                owned_by: entry.owned_by,
            })
            .collect())
    }

    fn translate_request(request: &ChatRequest) -> OpenAiRequest {
        let messages = request.messages.iter().map(translate_message).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAiTool {
                        r#type: "function".to_string(),
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        OpenAiRequest {
            model: request.model.clone(),
            messages,
            tools,
            temperature: request.temperature,
            stream: false,
        }
    }

    fn normalize_response(response: OpenAiResponse) -> Result<ChatResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("no choices in response"))?;

        let text = choice.message.content.unwrap_or_default();

        let mut tool_calls = Vec::new();
        for call in choice.message.tool_calls.unwrap_or_default() {
            if call.function.name.is_empty() {
                continue;
            }
            // Providers send arguments as a JSON string; tolerate garbage.
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| serde_json::json!({}));
            tool_calls.push(ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments,
            });
        }

        Ok(ChatResponse { text, tool_calls })
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let wire_request = Self::translate_request(request);

        let mut http_request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&wire_request);
        if let Some(key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {key}"));
        }

        let response = http_request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        let wire_response: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(wire_response)
    }
}

fn map_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::network(format!("request timeout: {e}"))
    } else if e.is_connect() {
        LlmError::network(format!("connection failed: {e}"))
    } else {
        LlmError::unknown(format!("request failed: {e}"))
    }
}

fn status_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<OpenAiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    match status {
        401 | 403 => LlmError::auth(format!("authentication failed: {message}")),
        429 => LlmError::rate_limit(format!("rate limit exceeded: {message}")),
        400 => LlmError::invalid_request(format!("invalid request: {message}")),
        500..=599 => LlmError::server_error(format!("server error: {message}")),
        other => LlmError::unknown(format!("HTTP {other}: {message}")),
    }
}

fn translate_message(message: &ChatMessage) -> OpenAiMessage {
    let content = if message.content.is_empty() && !message.tool_calls.is_empty() {
        // Pure tool-call turns omit content entirely.
        None
    } else {
        Some(message.content.clone())
    };

    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .iter()
                .map(|call| OpenAiToolCall {
                    id: call.id.clone(),
                    r#type: "function".to_string(),
                    function: OpenAiFunctionCall {
                        name: call.name.clone(),
                        arguments: serde_json::to_string(&call.arguments)
                            .unwrap_or_else(|_| "{}".to_string()),
                    },
                })
                .collect(),
        )
    };

    OpenAiMessage {
        role: message.role.as_str().to_string(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    r#type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ToolDefinition;

    fn request_with(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: "llama3.1:8b".to_string(),
            messages,
            tools: vec![ToolDefinition {
                name: "search".into(),
                description: "search the web".into(),
                input_schema: serde_json::json!({"type": "object"}),
            }],
            temperature: Some(0.5),
        }
    }

    #[test]
    fn test_translate_plain_messages() {
        let request = request_with(vec![
            ChatMessage::system("be helpful"),
            ChatMessage::user("hello"),
        ]);
        let wire = OpenAiClient::translate_request(&request);
        assert_eq!(wire.model, "llama3.1:8b");
        assert_eq!(wire.messages.len(), 2);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].content.as_deref(), Some("hello"));
        assert!(!wire.stream);
        assert_eq!(wire.temperature, Some(0.5));
        assert_eq!(wire.tools.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_translate_tool_call_turn_drops_content() {
        let call = ToolCallRequest {
            id: "call_1".into(),
            name: "search".into(),
            arguments: serde_json::json!({"query": "rust"}),
        };
        let request = request_with(vec![ChatMessage::assistant_tool_calls("", vec![call])]);
        let wire = OpenAiClient::translate_request(&request);
        assert_eq!(wire.messages[0].content, None);
        let calls = wire.messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "search");
        // Arguments are re-encoded as a JSON string on the wire.
        assert_eq!(calls[0].function.arguments, r#"{"query":"rust"}"#);
    }

    #[test]
    fn test_translate_tool_result_turn() {
        let request = request_with(vec![ChatMessage::tool("call_1", "result text")]);
        let wire = OpenAiClient::translate_request(&request);
        assert_eq!(wire.messages[0].role, "tool");
        assert_eq!(wire.messages[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_normalize_text_response() {
        let wire: OpenAiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
        }))
        .unwrap();
        let response = OpenAiClient::normalize_response(wire).unwrap();
        assert_eq!(response.text, "hi there");
        assert!(!response.has_tool_calls());
    }

    #[test]
    fn test_normalize_tool_call_response() {
        let wire: OpenAiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": {"name": "execute", "arguments": "{\"code\": \"2+2\"}"}
                }]
            }}]
        }))
        .unwrap();
        let response = OpenAiClient::normalize_response(wire).unwrap();
        assert!(response.text.is_empty());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "execute");
        assert_eq!(response.tool_calls[0].arguments["code"], "2+2");
    }

    #[test]
    fn test_normalize_malformed_arguments_fall_back_to_empty() {
        let wire: OpenAiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "search", "arguments": "not json"}
                }]
            }}]
        }))
        .unwrap();
        let response = OpenAiClient::normalize_response(wire).unwrap();
        assert_eq!(response.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn test_normalize_empty_choices_is_error() {
        let wire: OpenAiResponse = serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(OpenAiClient::normalize_response(wire).is_err());
    }

    #[test]
    fn test_status_error_mapping() {
        use crate::llm::LlmErrorKind;
        let body = r#"{"error": {"message": "nope"}}"#;
        assert_eq!(status_error(401, body).kind, LlmErrorKind::Auth);
        assert_eq!(status_error(429, body).kind, LlmErrorKind::RateLimit);
        assert_eq!(status_error(400, body).kind, LlmErrorKind::InvalidRequest);
        assert_eq!(status_error(503, body).kind, LlmErrorKind::ServerError);
        assert_eq!(status_error(418, body).kind, LlmErrorKind::Unknown);
        // Unparseable bodies fall back to the raw text.
        assert!(status_error(500, "plain text").message.contains("plain text"));
    }
}
