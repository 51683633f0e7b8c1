//! Crew：按顺序执行一组 Task 的 Agent 团队
//!
//! 研究流程只依赖 Crew trait；LlmCrew 是基于 LlmClient 的顺序执行实现。

pub mod output;
pub mod runtime;
pub mod schema;
pub mod traits;

pub use output::{extract_json, reject_html_page, CrewOutput};
pub use runtime::{interpolate, Agent, CrewSettings, LlmCrew, Task};
pub use schema::{output_schema_catalog, OutputSchema, SchemaOption};
pub use traits::{invoke_with_timeout, Crew};
