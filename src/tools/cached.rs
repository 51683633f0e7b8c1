//! 读穿缓存包装：先按 "{tag}:{query}" 查结果缓存，未命中才调用内部工具并写回
//!
//! 缓存读写失败只记日志，不影响工具本身的结果。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::ResultCache;
use crate::tools::registry::text_arg;
use crate::tools::Tool;

/// 空结果时返回给 Agent 的文本
pub const NO_RESULTS: &str = "No results found";

pub struct CachedTool {
    tag: String,
    inner: Arc<dyn Tool>,
    cache: Arc<ResultCache>,
    query_keys: &'static [&'static str],
}

impl CachedTool {
    pub fn new(tag: impl Into<String>, inner: Arc<dyn Tool>, cache: Arc<ResultCache>) -> Self {
        Self {
            tag: tag.into(),
            inner,
            cache,
            query_keys: &["question", "query"],
        }
    }

    /// 缓存键取自哪些参数字段（默认 question / query）
    pub fn with_query_keys(mut self, keys: &'static [&'static str]) -> Self {
        self.query_keys = keys;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn query_of(&self, args: &Value) -> String {
        text_arg(args, self.query_keys).unwrap_or_else(|| args.to_string())
    }
}

#[async_trait]
impl Tool for CachedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> Value {
        self.inner.parameters_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = self.query_of(&args);
        match self.cache.lookup(&self.tag, &query).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => tracing::warn!(tag = %self.tag, error = %e, "cache lookup failed"),
        }

        let data = self.inner.execute(args).await?;
        if data.trim().is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        if let Err(e) = self.cache.store(&self.tag, &query, &data).await {
            tracing::warn!(tag = %self.tag, error = %e, "cache store failed");
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_SIMILARITY_THRESHOLD;
    use crate::llm::HashingEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for Counting {
        fn name(&self) -> &str {
            "Counting"
        }
        fn description(&self) -> &str {
            "counts calls"
        }
        async fn execute(&self, args: Value) -> Result<String, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if args.get("question").and_then(Value::as_str) == Some("empty") {
                return Ok(String::new());
            }
            Ok(format!("fresh-{}", n))
        }
    }

    fn cache() -> Arc<ResultCache> {
        Arc::new(
            ResultCache::in_memory(Arc::new(HashingEmbedder::new(128)), DEFAULT_SIMILARITY_THRESHOLD)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let tool = CachedTool::new("GoogleSearch", inner.clone(), cache());
        let args = serde_json::json!({"question": "rust tokio"});
        assert_eq!(tool.execute(args.clone()).await.unwrap(), "fresh-0");
        assert_eq!(tool.execute(args).await.unwrap(), "fresh-0");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        tool.execute(serde_json::json!({"question": "something else entirely"}))
            .await
            .unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_cached() {
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let c = cache();
        let tool = CachedTool::new("Dummy", inner, c.clone());
        let out = tool
            .execute(serde_json::json!({"question": "empty"}))
            .await
            .unwrap();
        assert_eq!(out, NO_RESULTS);
        assert!(c.entries().unwrap().is_empty());
    }
}
