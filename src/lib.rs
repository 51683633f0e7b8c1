//! Crewbench - 声明式 Agent / Task / Crew 编排服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 分层错误类型
//! - **store**: agents / tasks / crews / inputs / 研究配置文件的读写
//! - **managers**: 定义到可执行对象的构建与缓存，Catalog 统一 CRUD
//! - **crew**: Crew 能力抽象、顺序执行运行时、结构化输出 schema
//! - **flow**: 自评估研究流程（prompt 工程 → 研究 → 评审）
//! - **llm**: LLM 客户端与向量化抽象（OpenAI 兼容 / DeepSeek / Mock / 本地哈希）
//! - **cache**: 基于向量相似度的工具结果缓存（SQLite）
//! - **tools**: 搜索 / 抓取工具与执行器
//! - **format**: 结果格式化、JSON / Excel 导出
//! - **observability**: tracing 初始化
//! - **web**: axum HTTP 接口

pub mod cache;
pub mod config;
pub mod core;
pub mod crew;
pub mod flow;
pub mod format;
pub mod llm;
pub mod managers;
pub mod observability;
pub mod store;
pub mod tools;
pub mod web;

pub use config::{load_config, AppConfig};
pub use core::AppError;
pub use crew::{Crew, CrewOutput};
pub use flow::{ResearchFlow, ResearchService};
pub use managers::Catalog;
