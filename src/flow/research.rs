//! 研究流程状态机
//!
//! Start：有 feedback（或首轮且开启 engineer_first_attempt）时先跑 prompt 工程 Crew 改写 prompt，
//! 再把运行输入与 prompt 合并后跑研究 Crew。
//! Reviewing：counter 超过 max_retries 即失败；否则跑评审 Crew，success_flag 为真则成功，否则带 feedback 回到 Start。
//! 任一 Crew 缺失或调用出错都进入 Failed。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::crew::{invoke_with_timeout, Crew, CrewOutput};
use crate::flow::{FlowStatus, ResearchState};
use crate::store::Inputs;

/// 失败且没有任何研究结果时返回的内容
pub const RESEARCH_NOT_COMPLETED: &str = r#"{"result":"Research could not be completed"}"#;

/// 三个角色的 Crew；None 表示该角色无法构建
#[derive(Clone, Default)]
pub struct ResearchCrews {
    pub prompt_engineer: Option<Arc<dyn Crew>>,
    pub research: Option<Arc<dyn Crew>>,
    pub review: Option<Arc<dyn Crew>>,
}

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub max_retries: u32,
    pub engineer_first_attempt: bool,
    pub invoke_timeout: Duration,
}

impl FlowSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_retries: cfg.research.max_retries,
            engineer_first_attempt: cfg.research.engineer_first_attempt,
            invoke_timeout: Duration::from_secs(cfg.crew.invoke_timeout_secs),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 流程结束时的终态、返回结果与完整状态
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub status: FlowStatus,
    pub result: String,
    pub state: ResearchState,
}

pub struct ResearchFlow {
    crews: ResearchCrews,
    inputs: Inputs,
    settings: FlowSettings,
}

impl ResearchFlow {
    pub fn new(crews: ResearchCrews, inputs: Inputs, settings: FlowSettings) -> Self {
        Self {
            crews,
            inputs,
            settings,
        }
    }

    pub async fn run(&self, prompt: &str) -> FlowOutcome {
        tracing::info!(prompt, max_retries = self.settings.max_retries, "starting research flow");
        let mut state = ResearchState::new(prompt);
        let mut status = FlowStatus::Start;
        let mut first_attempt = true;

        while !status.is_terminal() {
            status = match status {
                FlowStatus::Start => {
                    let next = self.start(&mut state, first_attempt).await;
                    first_attempt = false;
                    next
                }
                FlowStatus::Reviewing => self.review(&mut state).await,
                terminal => terminal,
            };
            tracing::debug!(?status, counter = state.counter, "research flow transition");
        }

        let result = match status {
            FlowStatus::Success => {
                tracing::info!(counter = state.counter, "research successfully completed");
                state.research.clone()
            }
            _ if !state.research.is_empty() => {
                tracing::info!(counter = state.counter, "research flow failed, returning last research");
                state.research.clone()
            }
            _ => {
                tracing::info!(counter = state.counter, "research flow failed without research");
                RESEARCH_NOT_COMPLETED.to_string()
            }
        };
        FlowOutcome {
            status,
            result,
            state,
        }
    }

    async fn call(&self, crew: &Arc<dyn Crew>, inputs: &Inputs) -> Result<CrewOutput, String> {
        invoke_with_timeout(crew.as_ref(), inputs, self.settings.invoke_timeout)
            .await
            .map_err(|e| e.to_string())
    }

    async fn start(&self, state: &mut ResearchState, first_attempt: bool) -> FlowStatus {
        let engineer = !state.feedback.is_empty()
            || (first_attempt && self.settings.engineer_first_attempt);
        if engineer {
            tracing::info!(feedback = %state.feedback, "engineering prompt");
            state.counter += 1;
            let Some(crew) = &self.crews.prompt_engineer else {
                tracing::error!("prompt engineer crew not initialized");
                return FlowStatus::Failed;
            };
            let mut pe_inputs = Inputs::new();
            pe_inputs.insert("prompt".into(), state.prompt.clone());
            pe_inputs.insert("feedback".into(), state.feedback.clone());
            match self.call(crew, &pe_inputs).await {
                Ok(out) => {
                    state.prompt = out.field_str("prompt").unwrap_or_else(|| out.raw.clone());
                    state.prompt_change_rationale =
                        out.field_str("prompt_change_rationale").unwrap_or_default();
                }
                Err(e) => {
                    tracing::error!(error = %e, "error in prompt engineering");
                    return FlowStatus::Failed;
                }
            }
        }

        let mut inputs = self.inputs.clone();
        inputs.insert("prompt".into(), state.prompt.clone());
        state.counter += 1;
        let research = match &self.crews.research {
            Some(crew) => self.call(crew, &inputs).await,
            None => Err("Research crew not initialized".to_string()),
        };
        match research {
            Ok(out) => {
                state.research = out.field_str("research").unwrap_or_else(|| out.raw.clone());
                FlowStatus::Reviewing
            }
            Err(e) => {
                tracing::error!(error = %e, "error in research");
                state.research = format!("Error performing research: {}", e);
                FlowStatus::Failed
            }
        }
    }

    async fn review(&self, state: &mut ResearchState) -> FlowStatus {
        if state.counter > self.settings.max_retries {
            tracing::info!(counter = state.counter, "max retries reached");
            return FlowStatus::Failed;
        }
        state.counter += 1;
        let Some(crew) = &self.crews.review else {
            tracing::error!("research review crew not initialized");
            return FlowStatus::Failed;
        };
        let mut inputs = Inputs::new();
        inputs.insert("research".into(), state.research.clone());
        let out = match self.call(crew, &inputs).await {
            Ok(out) => out,
            Err(e) => {
                tracing::error!(error = %e, "error in review");
                return FlowStatus::Failed;
            }
        };
        match out.field_str("feedback") {
            Some(feedback) => {
                state.feedback = feedback;
                state.success_flag = out.field_bool("success_flag").unwrap_or(false);
            }
            None => {
                state.feedback = out.raw.clone();
                state.success_flag = false;
            }
        }
        if state.success_flag {
            FlowStatus::Success
        } else {
            FlowStatus::Start
        }
    }
}
