//! 结果缓存：按 "{tag}:{query}" 的向量近邻命中的外部工具结果缓存

pub mod result_cache;

pub use result_cache::{
    cache_key, cosine_distance, CachedEntry, ResultCache, DB_FILE_NAME, DEFAULT_SIMILARITY_THRESHOLD,
};
