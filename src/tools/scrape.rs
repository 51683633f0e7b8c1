//! 网页抓取工具：GET URL，HTML 转可读文本，超长截断

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde_json::Value;

use crate::tools::registry::text_arg;
use crate::tools::{truncate_chars, Tool};

pub struct ScrapeTool {
    client: Client,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    let lower = s.get(..s.len().min(64)).unwrap_or("").to_ascii_lowercase();
    lower.starts_with("<!") || lower.starts_with("<html") || (s.contains("</") && s.contains("<body"))
}

pub fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

impl ScrapeTool {
    pub fn new(client: Client, max_result_chars: usize) -> Self {
        Self {
            client,
            max_result_chars,
        }
    }
}

#[async_trait]
impl Tool for ScrapeTool {
    fn name(&self) -> &str {
        "Scrape Website"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text content. Args: url"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = text_arg(&args, &["url", "question"]).ok_or("Missing url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Invalid URL: {}", url));
        }
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}');
        let text = if looks_like_html(body) {
            html_to_text(body)
        } else {
            body.to_string()
        };
        Ok(truncate_chars(&text, self.max_result_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_detection_and_text() {
        let html = "<!DOCTYPE html><html><body><h1>Title</h1><p>Hello world</p></body></html>";
        assert!(looks_like_html(html));
        assert!(!looks_like_html("{\"a\": 1}"));
        let text = html_to_text(html);
        assert!(text.contains("Hello world"));
        assert_eq!(strip_html_tags("<p>a</p><p>b</p>"), "a b");
    }

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let tool = ScrapeTool::new(Client::new(), 100);
        assert!(tool
            .execute(serde_json::json!({"url": "file:///etc/passwd"}))
            .await
            .is_err());
    }
}
