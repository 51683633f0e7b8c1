//! 声明式配置存储：agents / tasks / crews（YAML）、运行输入（JSON）、研究配置（YAML）

pub mod definitions;
pub mod file_store;

pub use definitions::{
    find_by_name, AgentDef, AgentEntry, CrewDef, CrewEntry, Entry, Inputs, ResearchConfig, ResearchConfigs,
    TaskDef, TaskEntry,
};
pub use file_store::{ConfigStore, Document, Format};
