//! 实体管理：把配置中的 Agent / Task / Crew 定义构建为可执行对象
//!
//! 每个管理器持有按名索引的缓存，编辑 / 删除时由 Catalog 显式失效。

pub mod agent;
pub mod build_cache;
pub mod catalog;
pub mod crew;
pub mod task;

pub use agent::AgentManager;
pub use build_cache::BuildCache;
pub use catalog::Catalog;
pub use crew::CrewManager;
pub use task::TaskManager;
