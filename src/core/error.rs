//! 错误类型
//!
//! 按层划分：配置存储（StoreError）、结果缓存（CacheError）、Crew 执行（CrewError），
//! 由 AppError 汇总供 Web 层转换为 JSON 错误响应。

use thiserror::Error;

/// 声明式配置文件读写错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error in {path}: {message}")]
    Yaml { path: String, message: String },

    #[error("JSON error in {path}: {message}")]
    Json { path: String, message: String },
}

/// 结果缓存错误（SQLite / 向量化）
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crew 调用错误：流程中的每一步单独捕获
#[derive(Error, Debug)]
pub enum CrewError {
    #[error("Crew not initialized: {0}")]
    NotInitialized(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Crew timed out after {0}s")]
    Timeout(u64),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Crew has no tasks")]
    NoTasks,
}

/// 应用层错误
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Crew(#[from] CrewError),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Could not create crew: {0}")]
    CrewUnavailable(String),

    #[error("Index out of range: {0}")]
    IndexOutOfRange(usize),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Export error: {0}")]
    Export(String),
}
