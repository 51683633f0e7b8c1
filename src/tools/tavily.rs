//! Tavily 问答式搜索：返回 answer 字段

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::tools::registry::text_arg;
use crate::tools::{truncate_chars, Tool};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

pub struct TavilySearchTool {
    client: Client,
    api_key: Option<String>,
    url: String,
    max_result_chars: usize,
}

impl TavilySearchTool {
    pub fn new(client: Client, api_key: Option<String>, max_result_chars: usize) -> Self {
        Self {
            client,
            api_key,
            url: TAVILY_SEARCH_URL.to_string(),
            max_result_chars,
        }
    }
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "Search Tavily"
    }

    fn description(&self) -> &str {
        "Search the internet using Tavily and get a direct answer to a question. Args: question"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let q = text_arg(&args, &["question", "query"]).ok_or("Missing question")?;
        let key = self.api_key.as_deref().ok_or("TAVILY_API_KEY not configured")?;

        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "api_key": key,
                "query": q,
                "search_depth": "advanced",
                "include_answer": true,
                "max_results": 10,
            }))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: Value = resp.json().await.map_err(|e| format!("Invalid JSON: {}", e))?;
        let answer = body
            .get("answer")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(truncate_chars(answer, self.max_result_chars))
    }
}
