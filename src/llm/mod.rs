//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）与缓存键向量化

pub mod embedding;
pub mod mock;
pub mod openai;
pub mod traits;

pub use embedding::{create_embedder_from_config, Embedder, HashingEmbedder, OpenAiEmbedder};
pub use mock::MockLlmClient;
pub use openai::{create_llm_from_config, OpenAiClient, TokenUsage};
pub use traits::{LlmClient, Message, Role};
