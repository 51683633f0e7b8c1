//! 研究流程状态

use serde::Serialize;

/// 流程所处阶段；Success / Failed 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Start,
    Reviewing,
    Success,
    Failed,
}

impl FlowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStatus::Success | FlowStatus::Failed)
    }
}

/// 一次流程运行的全部可变状态，运行结束后交还调用方
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResearchState {
    /// 每次调用 Crew 前递增
    pub counter: u32,
    pub prompt: String,
    pub prompt_change_rationale: String,
    pub research: String,
    pub success_flag: bool,
    pub feedback: String,
}

impl ResearchState {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}
