//! Serper（google.serper.dev）Google 网页 / 新闻搜索

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::tools::registry::text_arg;
use crate::tools::{truncate_chars, Tool};

const SERPER_BASE_URL: &str = "https://google.serper.dev";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerperKind {
    Web,
    News,
}

impl SerperKind {
    fn endpoint(self) -> &'static str {
        match self {
            SerperKind::Web => "search",
            SerperKind::News => "news",
        }
    }

    /// 响应中结果列表所在字段
    fn results_field(self) -> &'static str {
        match self {
            SerperKind::Web => "organic",
            SerperKind::News => "news",
        }
    }
}

pub struct SerperSearchTool {
    client: Client,
    kind: SerperKind,
    api_key: Option<String>,
    max_result_chars: usize,
}

impl SerperSearchTool {
    pub fn new(kind: SerperKind, client: Client, api_key: Option<String>, max_result_chars: usize) -> Self {
        Self {
            client,
            kind,
            api_key,
            max_result_chars,
        }
    }
}

/// 只保留 title / link / snippet / date，去掉位置等噪声字段
fn compact_results(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let mut out = serde_json::Map::new();
            for key in ["title", "link", "snippet", "date", "source"] {
                if let Some(v) = item.get(key) {
                    out.insert(key.to_string(), v.clone());
                }
            }
            Value::Object(out)
        })
        .collect()
}

#[async_trait]
impl Tool for SerperSearchTool {
    fn name(&self) -> &str {
        match self.kind {
            SerperKind::Web => "Search Internet",
            SerperKind::News => "Search News",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            SerperKind::Web => "Search the internet using Google for articles about a question. Args: question",
            SerperKind::News => "Search Google News for recent articles about a question. Args: question",
        }
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let q = text_arg(&args, &["question", "query"]).ok_or("Missing question")?;
        let key = self.api_key.as_deref().ok_or("SERPER_API_KEY not configured")?;

        let url = format!("{}/{}", SERPER_BASE_URL, self.kind.endpoint());
        let resp = self
            .client
            .post(&url)
            .header("X-API-KEY", key)
            .json(&serde_json::json!({ "q": q, "num": 10 }))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: Value = resp.json().await.map_err(|e| format!("Invalid JSON: {}", e))?;
        let items = body
            .get(self.kind.results_field())
            .and_then(Value::as_array)
            .map(|a| compact_results(a))
            .unwrap_or_default();
        if items.is_empty() {
            return Ok(String::new());
        }
        let text = serde_json::to_string(&items).map_err(|e| e.to_string())?;
        Ok(truncate_chars(&text, self.max_result_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_results_keeps_known_fields() {
        let items = vec![serde_json::json!({
            "title": "T", "link": "https://a", "snippet": "S", "position": 1
        })];
        let out = compact_results(&items);
        assert_eq!(out[0], serde_json::json!({"title": "T", "link": "https://a", "snippet": "S"}));
    }

    #[tokio::test]
    async fn test_missing_key_is_an_error() {
        let tool = SerperSearchTool::new(SerperKind::News, Client::new(), None, 100);
        assert_eq!(tool.name(), "Search News");
        let err = tool
            .execute(serde_json::json!({"question": "rust"}))
            .await
            .unwrap_err();
        assert!(err.contains("SERPER_API_KEY"));
    }
}
