//! URL-fetch tool

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Instruction appended after the fetched content.
const SUMMARIZE_SUFFIX: &str =
    " The user requested this website. Give him the information in a summarized form.";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Deserialize)]
struct FetchUrlInput {
    url: String,
}

/// Tool that fetches one URL and returns it as readable markdown.
///
/// Every failure — bad URL, network, conversion — is folded into an
/// `"An error occurred: …"` result string; this tool never errors past
/// its boundary.
pub struct FetchUrlTool {
    client: reqwest::Client,
}

impl FetchUrlTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let html = response.text().await.map_err(|e| e.to_string())?;
        let markdown = html_to_markdown(&html)?;
        Ok(format!("{markdown}{SUMMARIZE_SUFFIX}"))
    }
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert an HTML document to markdown, dropping script/style noise.
pub(crate) fn html_to_markdown(html: &str) -> Result<String, String> {
    htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "head", "nav", "footer"])
        .build()
        .convert(html)
        .map_err(|e| e.to_string())
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &'static str {
        "fetch_url"
    }

    fn description(&self) -> String {
        "Use it when you need to get the content of a website. You can pass one url as a parameter."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            }
        })
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> ToolOutput {
        let input: FetchUrlInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        match self.fetch(&input.url).await {
            Ok(content) => ToolOutput::success(content),
            Err(detail) => {
                tracing::warn!(url = %input.url, error = %detail, "fetch_url failed");
                ToolOutput::success(format!("An error occurred: {detail}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_markdown_strips_scripts() {
        let html = r"<html><body><script>alert(1)</script><h1>Title</h1><p>Body text</p></body></html>";
        let markdown = html_to_markdown(html).unwrap();
        assert!(markdown.contains("Title"));
        assert!(markdown.contains("Body text"));
        assert!(!markdown.contains("alert"));
    }

    #[tokio::test]
    async fn test_unreachable_host_becomes_error_string() {
        let tool = FetchUrlTool::new();
        let output = tool
            .run(
                json!({"url": "http://127.0.0.1:1/nothing"}),
                ToolContext::new("s1"),
            )
            .await;
        // Transient failures are successful tool results carrying the
        // error text, so the conversation keeps going.
        assert!(output.success);
        assert!(output.output.starts_with("An error occurred:"));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let tool = FetchUrlTool::new();
        let output = tool.run(json!({"address": "x"}), ToolContext::new("s1")).await;
        assert!(!output.success);
    }
}
