//! 嵌入：把缓存键（查询文本）编码为向量
//!
//! - OpenAiEmbedder：调用 OpenAI 兼容 /embeddings 端点
//! - HashingEmbedder：本地字符 n-gram 哈希，无网络、结果确定

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::llm::openai::openai_config;

/// 嵌入提供方
#[async_trait]
pub trait Embedder: Send + Sync {
    /// 将文本编码为向量；失败时返回错误字符串
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

/// 使用 async-openai 调用 OpenAI 兼容的 embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::with_config(openai_config(base_url, api_key)),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;
        Ok(response
            .data
            .first()
            .map(|e| e.embedding.clone())
            .unwrap_or_default())
    }
}

/// 本地哈希嵌入：小写后取词与字符三元组，哈希到固定维度并做 L2 归一化
///
/// 相同文本得到相同向量（距离 0）；仅大小写或空白不同的文本也落到同一向量。
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
        (((h >> 1) % self.dimensions as u64) as usize, sign)
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized = text
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let mut v = vec![0.0f32; self.dimensions];
        if normalized.is_empty() {
            return v;
        }
        for word in normalized.split(' ') {
            let (i, s) = self.bucket(&format!("w:{}", word));
            v[i] += s;
        }
        let chars: Vec<char> = format!(" {} ", normalized).chars().collect();
        for gram in chars.windows(3) {
            let g: String = gram.iter().collect();
            let (i, s) = self.bucket(&format!("c:{}", g));
            v[i] += 0.5 * s;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        Ok(self.embed_text(text))
    }
}

/// 按 [embedding] 段创建嵌入提供方；openai 未配置 key 时回退到 hashing
pub fn create_embedder_from_config(cfg: &AppConfig) -> Arc<dyn Embedder> {
    if cfg.embedding.provider == "openai" {
        let key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        if let Some(key) = key {
            return Arc::new(OpenAiEmbedder::new(
                cfg.embedding.base_url.as_deref(),
                &cfg.embedding.model,
                Some(&key),
            ));
        }
        tracing::warn!("OPENAI_API_KEY not set, falling back to hashing embedder");
    }
    Arc::new(HashingEmbedder::new(cfg.embedding.dimensions))
}
