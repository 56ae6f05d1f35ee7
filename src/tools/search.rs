//! Web-search tool
//!
//! Runs the query against the DuckDuckGo HTML endpoint, fetches the top
//! N result pages, and hands the model one markdown block per page plus
//! a fixed summarization instruction.

use super::fetch::html_to_markdown;
use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Instruction appended after the collected result blocks.
const SUMMARIZE_SUFFIX: &str =
    "The user requested specific information. Give him this information in a summarized form.";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
}

/// Tool that searches the web and returns readable result content.
///
/// The result count comes from configuration and is validated at startup;
/// per-call failures are folded into an `"An error occurred: …"` string.
pub struct WebSearchTool {
    client: reqwest::Client,
    num_results: usize,
}

impl WebSearchTool {
    pub fn new(num_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            num_results,
        }
    }

    async fn search(&self, query: &str) -> Result<String, String> {
        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let html = response.text().await.map_err(|e| e.to_string())?;

        let urls = extract_result_urls(&html, self.num_results);
        if urls.is_empty() {
            return Err(format!("no search results found for {query:?}"));
        }

        let mut content = String::new();
        for url in urls {
            // One bad page must not sink the whole search.
            match self.fetch_page(&url).await {
                Ok(markdown) => {
                    content.push_str(&format!("URL: {url}\n\n {markdown}\n\n"));
                }
                Err(detail) => {
                    tracing::debug!(url = %url, error = %detail, "skipping search result");
                }
            }
        }
        if content.is_empty() {
            return Err("every search result failed to load".to_string());
        }

        content.push_str(SUMMARIZE_SUFFIX);
        Ok(content)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let html = response.text().await.map_err(|e| e.to_string())?;
        html_to_markdown(&html)
    }
}

/// Pull target URLs out of a DuckDuckGo HTML results page, in page order.
///
/// Result anchors carry a redirect href whose `uddg` parameter holds the
/// destination; plain absolute hrefs are taken as-is.
fn extract_result_urls(html: &str, limit: usize) -> Vec<String> {
    static RESULT_LINK: OnceLock<Regex> = OnceLock::new();
    let pattern = RESULT_LINK.get_or_init(|| {
        Regex::new(r#"<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]+)""#)
            .unwrap_or_else(|e| panic!("invalid result-link pattern: {e}"))
    });

    let mut urls = Vec::new();
    for capture in pattern.captures_iter(html) {
        if urls.len() >= limit {
            break;
        }
        if let Some(url) = decode_result_href(&capture[1]) {
            urls.push(url);
        }
    }
    urls
}

fn decode_result_href(href: &str) -> Option<String> {
    // Redirect hrefs are protocol-relative: //duckduckgo.com/l/?uddg=…
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;

    if parsed.path().starts_with("/l/") {
        let (_, target) = parsed.query_pairs().find(|(key, _)| key == "uddg")?;
        return Some(target.into_owned());
    }
    Some(absolute)
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> String {
        "Use it to get information from the web. You can pass a query as a parameter. \
         Summarize the information and provide urls to the sources."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            }
        })
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> ToolOutput {
        let input: WebSearchInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        match self.search(&input.query).await {
            Ok(content) => ToolOutput::success(content),
            Err(detail) => {
                tracing::warn!(query = %input.query, error = %detail, "web_search failed");
                ToolOutput::success(format!("An error occurred: {detail}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <div class="result">
          <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Ffirst&amp;rut=abc">First</a>
        </div>
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://example.org/second">Second</a>
        </div>
        <div class="result">
          <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.net%2Fthird">Third</a>
        </div>
    "#;

    #[test]
    fn test_extract_result_urls_decodes_redirects() {
        let urls = extract_result_urls(RESULTS_PAGE, 10);
        assert_eq!(
            urls,
            vec![
                "https://example.com/first",
                "https://example.org/second",
                "https://example.net/third",
            ]
        );
    }

    #[test]
    fn test_extract_result_urls_honors_limit() {
        let urls = extract_result_urls(RESULTS_PAGE, 2);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], "https://example.com/first");
    }

    #[test]
    fn test_extract_result_urls_ignores_other_anchors() {
        let html = r#"<a class="nav__link" href="https://duckduckgo.com/about">About</a>"#;
        assert!(extract_result_urls(html, 10).is_empty());
    }

    #[test]
    fn test_decode_result_href_plain() {
        assert_eq!(
            decode_result_href("https://example.com/page").as_deref(),
            Some("https://example.com/page")
        );
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let tool = WebSearchTool::new(3);
        let output = tool.run(json!({"q": "typo"}), ToolContext::new("s1")).await;
        assert!(!output.success);
    }
}
