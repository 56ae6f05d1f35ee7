//! Server-Sent Events framing for agent streams
//!
//! Exactly one SSE frame per agent event, written in emission order —
//! nothing is batched, and no event is ever split across frames.

use crate::agent::AgentEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Wrap an agent event stream as an SSE response.
pub fn agent_event_stream(
    events: ReceiverStream<AgentEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = events.map(|event| Ok(to_frame(event)));
    Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_frame(event: AgentEvent) -> Event {
    let (name, data) = frame_parts(&event);
    Event::default().event(name).data(data)
}

/// Event name plus compact JSON payload for one frame.
fn frame_parts(event: &AgentEvent) -> (&'static str, String) {
    let name = match event {
        AgentEvent::ToolInvoked { .. } => "tool_invoked",
        AgentEvent::ToolResult { .. } => "tool_result",
        AgentEvent::AssistantText { .. } => "assistant_text",
        AgentEvent::Error { .. } => "error",
    };
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    (name, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_parts_names() {
        let cases = vec![
            (
                AgentEvent::ToolInvoked {
                    name: "web_search".into(),
                    args: json!({}),
                },
                "tool_invoked",
            ),
            (
                AgentEvent::ToolResult {
                    name: "web_search".into(),
                    output: "found".into(),
                },
                "tool_result",
            ),
            (
                AgentEvent::AssistantText { text: "hi".into() },
                "assistant_text",
            ),
            (
                AgentEvent::Error {
                    message: "boom".into(),
                },
                "error",
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(frame_parts(&event).0, expected);
        }
    }

    #[test]
    fn test_frame_payload_is_single_line_json() {
        let event = AgentEvent::AssistantText {
            text: "line one\nline two".into(),
        };
        let (_, data) = frame_parts(&event);
        // Newlines must stay escaped inside the JSON string so the frame
        // is never split across SSE data lines.
        assert!(!data.contains('\n'));
        let parsed: AgentEvent = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed, event);
    }
}
