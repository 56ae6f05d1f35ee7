//! Agent loop / streaming orchestrator
//!
//! Drives one request through the model: ask the model, run any tool it
//! proposes, feed the result back, repeat until it answers in text. Every
//! step is emitted as an [`AgentEvent`] in production order; a dropped
//! subscriber ends the loop at its next emission point.

mod events;
mod memory;

pub use events::AgentEvent;
pub use memory::MemoryStore;

use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::tools::{ToolContext, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Hard ceiling on model turns per request, so a model that keeps
/// proposing tools cannot loop forever.
const MAX_TURNS: usize = 16;

const TEMPERATURE: f32 = 0.5;

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to various tools. \
                             Always strive to provide accurate and helpful information.";

/// Returned by the non-streaming entry point when the model never
/// produced assistant text.
pub const NO_RESPONSE: &str = "No AI response found.";

/// The agent service: one instance serves every session concurrently.
///
/// Registries are assembled once here and never change; the `advanced`
/// flag on each request picks which one the model sees.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    standard: Arc<ToolRegistry>,
    restricted: Arc<ToolRegistry>,
    memory: MemoryStore,
    tool_timeout: Duration,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        standard: ToolRegistry,
        restricted: ToolRegistry,
        memory: MemoryStore,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            model,
            standard: Arc::new(standard),
            restricted: Arc::new(restricted),
            memory,
            tool_timeout,
        }
    }

    /// Run the loop for one request, streaming events as they happen.
    ///
    /// Only the LAST message of the submitted history becomes user
    /// content; turn-to-turn continuity comes from the server-side memory
    /// keyed by `session_id`.
    pub fn stream_response(
        &self,
        messages: Vec<ChatMessage>,
        model: String,
        advanced: bool,
        session_id: String,
    ) -> ReceiverStream<AgentEvent> {
        let (tx, rx) = mpsc::channel(16);
        let runner = LoopRunner {
            model: self.model.clone(),
            registry: if advanced {
                self.standard.clone()
            } else {
                self.restricted.clone()
            },
            memory: self.memory.clone(),
            tool_timeout: self.tool_timeout,
            model_id: model,
            session_id,
        };
        tokio::spawn(async move {
            runner.run(messages, tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Run the same loop to completion and return only the final
    /// assistant text, discarding tool-call chatter. Never raises: a
    /// failed request comes back as an error string.
    pub async fn get_response(
        &self,
        messages: Vec<ChatMessage>,
        model: String,
        advanced: bool,
        session_id: String,
    ) -> String {
        let mut stream = self.stream_response(messages, model, advanced, session_id);
        let mut last_text: Option<String> = None;
        let mut error: Option<String> = None;
        while let Some(event) = stream.next().await {
            match event {
                AgentEvent::AssistantText { text } => last_text = Some(text),
                AgentEvent::Error { message } => error = Some(message),
                AgentEvent::ToolInvoked { .. } | AgentEvent::ToolResult { .. } => {}
            }
        }
        match (last_text, error) {
            (Some(text), _) => text,
            (None, Some(message)) => format!("Error: {message}"),
            (None, None) => NO_RESPONSE.to_string(),
        }
    }
}

/// Everything one in-flight request needs, detached from the service so
/// the loop can run on its own task.
struct LoopRunner {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    memory: MemoryStore,
    tool_timeout: Duration,
    model_id: String,
    session_id: String,
}

/// The subscriber dropped the stream; stop producing.
struct Disconnected;

impl LoopRunner {
    async fn run(self, messages: Vec<ChatMessage>, tx: mpsc::Sender<AgentEvent>) {
        tracing::info!(
            session = %self.session_id,
            model = %self.model_id,
            "starting agent loop"
        );

        // Reference behavior: only the last submitted message is used as
        // user content; prior turns come from memory.
        let last_message = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut context = self.memory.load(&self.session_id);
        if context.is_empty() {
            context.push(ChatMessage::system(SYSTEM_PROMPT));
        }
        context.push(ChatMessage::user(last_message));

        // A dropped subscriber aborts the loop; the context accumulated
        // so far is still saved.
        let _ = self.drive(&mut context, &tx).await;

        self.memory.save(&self.session_id, context);
    }

    async fn drive(
        &self,
        context: &mut Vec<ChatMessage>,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<(), Disconnected> {
        for _turn in 0..MAX_TURNS {
            let request = ChatRequest {
                model: self.model_id.clone(),
                messages: context.clone(),
                tools: self.registry.definitions(),
                temperature: Some(TEMPERATURE),
            };

            let response = match self.model.complete(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(session = %self.session_id, error = %e, "model call failed");
                    emit(
                        tx,
                        AgentEvent::Error {
                            message: e.to_string(),
                        },
                    )
                    .await?;
                    return Ok(());
                }
            };

            if response.has_tool_calls() {
                let calls = response.tool_calls.clone();
                context.push(ChatMessage::assistant_tool_calls(
                    response.text.clone(),
                    calls.clone(),
                ));

                // The model may think out loud while calling tools;
                // whitespace-only text stays suppressed.
                if !response.text.trim().is_empty() {
                    emit(
                        tx,
                        AgentEvent::AssistantText {
                            text: response.text.clone(),
                        },
                    )
                    .await?;
                }

                for call in calls {
                    emit(
                        tx,
                        AgentEvent::ToolInvoked {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        },
                    )
                    .await?;

                    let output = self.run_tool(&call.name, call.arguments.clone()).await;

                    emit(
                        tx,
                        AgentEvent::ToolResult {
                            name: call.name.clone(),
                            output: output.clone(),
                        },
                    )
                    .await?;

                    context.push(ChatMessage::tool(call.id.clone(), output));
                }
                continue;
            }

            let text = response.text;
            if !text.trim().is_empty() {
                context.push(ChatMessage::assistant(text.clone()));
                emit(tx, AgentEvent::AssistantText { text }).await?;
            }
            return Ok(());
        }

        tracing::warn!(session = %self.session_id, "agent loop hit the turn ceiling");
        emit(
            tx,
            AgentEvent::Error {
                message: format!("agent loop exceeded the maximum of {MAX_TURNS} turns"),
            },
        )
        .await?;
        Ok(())
    }

    /// Execute one tool call under the configured deadline. Always
    /// returns a result string for the model: validation failures, tool
    /// errors, timeouts, and unknown tools all flow back as text so the
    /// conversation can continue.
    async fn run_tool(&self, name: &str, args: serde_json::Value) -> String {
        tracing::info!(session = %self.session_id, tool = %name, "executing tool");
        let ctx = ToolContext::new(self.session_id.as_str());
        match tokio::time::timeout(self.tool_timeout, self.registry.execute(name, args, ctx)).await
        {
            Err(_) => {
                tracing::warn!(tool = %name, timeout_s = self.tool_timeout.as_secs(), "tool timed out");
                format!(
                    "Error: tool '{name}' timed out after {}s",
                    self.tool_timeout.as_secs()
                )
            }
            Ok(None) => format!("Error: unknown tool '{name}'"),
            Ok(Some(output)) => output.output,
        }
    }
}

/// Send one event and yield, so a single-threaded host can interleave
/// other in-flight streams between events.
async fn emit(tx: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), Disconnected> {
    if tx.send(event).await.is_err() {
        return Err(Disconnected);
    }
    tokio::task::yield_now().await;
    Ok(())
}
