//! Exa 神经搜索：返回标题 / URL / 高亮片段

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::registry::text_arg;
use crate::tools::{truncate_chars, Tool};

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";

pub struct ExaSearchTool {
    client: Client,
    api_key: Option<String>,
    url: String,
    max_result_chars: usize,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    highlights: Vec<String>,
}

impl ExaSearchTool {
    pub fn new(client: Client, api_key: Option<String>, max_result_chars: usize) -> Self {
        Self {
            client,
            api_key,
            url: EXA_SEARCH_URL.to_string(),
            max_result_chars,
        }
    }
}

fn render_results(results: &[ExaResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            format!(
                "<Title id={idx}>{}</Title><URL id={idx}>{}</URL><Highlight id={idx}>{}</Highlight>",
                r.title.as_deref().unwrap_or_default(),
                r.url,
                r.highlights.join(" ")
            )
        })
        .collect()
}

#[async_trait]
impl Tool for ExaSearchTool {
    fn name(&self) -> &str {
        "ExaSearchTool"
    }

    fn description(&self) -> &str {
        "Run a neural semantic search with Exa and return result highlights. Args: question"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let q = text_arg(&args, &["question", "query"]).ok_or("Missing question")?;
        let key = self.api_key.as_deref().ok_or("EXA_API_KEY not configured")?;

        let resp = self
            .client
            .post(&self.url)
            .header("x-api-key", key)
            .json(&serde_json::json!({
                "query": q,
                "type": "neural",
                "useAutoprompt": true,
                "numResults": 10,
                "contents": { "highlights": true },
            }))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: ExaResponse = resp.json().await.map_err(|e| format!("Invalid JSON: {}", e))?;
        Ok(truncate_chars(&render_results(&body.results), self.max_result_chars))
    }
}
