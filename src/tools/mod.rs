//! 工具层：Agent 可调用的外部搜索 / 抓取工具，统一经 CachedTool 走结果缓存

pub mod cached;
pub mod dummy;
pub mod exa;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod scrape;
pub mod serper;
pub mod tavily;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

pub use cached::CachedTool;
pub use dummy::DummyTool;
pub use exa::ExaSearchTool;
pub use executor::ToolExecutor;
pub use registry::{text_arg, Tool, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use scrape::ScrapeTool;
pub use serper::{SerperKind, SerperSearchTool};
pub use tavily::TavilySearchTool;

use crate::cache::ResultCache;
use crate::config::ToolsSection;

/// 超过 max_chars 时截断并追加 ...[truncated]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        s.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        s.to_string()
    }
}

/// 带超时与 User-Agent 的共享 HTTP 客户端
pub fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("crewbench/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// 构建默认工具集，每个工具以各自的缓存标签包一层 CachedTool
pub fn build_default_registry(cfg: &ToolsSection, cache: Arc<ResultCache>) -> ToolRegistry {
    let client = http_client(cfg.http_timeout_secs);
    let max = cfg.max_result_chars;

    let mut registry = ToolRegistry::new();
    let mut add = |tag: &str, tool: Arc<dyn Tool>, keys: &'static [&'static str]| {
        registry.register(CachedTool::new(tag, tool, cache.clone()).with_query_keys(keys));
    };
    let search_keys: &'static [&'static str] = &["question", "query"];

    add(
        "GoogleSearch",
        Arc::new(SerperSearchTool::new(SerperKind::Web, client.clone(), cfg.api_key("serper"), max)),
        search_keys,
    );
    add(
        "GoogleNews",
        Arc::new(SerperSearchTool::new(SerperKind::News, client.clone(), cfg.api_key("serper"), max)),
        search_keys,
    );
    add(
        "Tavily",
        Arc::new(TavilySearchTool::new(client.clone(), cfg.api_key("tavily"), max)),
        search_keys,
    );
    add(
        "ExaSearch",
        Arc::new(ExaSearchTool::new(client.clone(), cfg.api_key("exa"), max)),
        search_keys,
    );
    add("Scrape", Arc::new(ScrapeTool::new(client, max)), &["url", "question"]);
    add("Dummy", Arc::new(DummyTool), &["question"]);

    tracing::info!(tools = ?registry.tool_names(), "tool registry built");
    registry
}
