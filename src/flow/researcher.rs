//! ResearchService：按名称解析研究配置，构建三个角色的 Crew 并运行流程

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::Instrument;

use crate::core::AppError;
use crate::crew::Crew;
use crate::flow::{FlowOutcome, FlowSettings, ResearchCrews, ResearchFlow};
use crate::format::format_result;
use crate::managers::Catalog;
use crate::store::{Inputs, ResearchConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrewRole {
    PromptEngineer,
    Research,
    Review,
}

impl CrewRole {
    pub fn as_str(self) -> &'static str {
        match self {
            CrewRole::PromptEngineer => "prompt_engineer",
            CrewRole::Research => "research",
            CrewRole::Review => "research_review",
        }
    }

    fn crew_name(self, config: &ResearchConfig) -> &str {
        match self {
            CrewRole::PromptEngineer => &config.prompt_engineer_crew,
            CrewRole::Research => &config.research_crew,
            CrewRole::Review => &config.research_review_crew,
        }
    }
}

/// 一次研究的结果：流程终态 + 格式化文本
#[derive(Debug, Clone)]
pub struct ResearchRun {
    /// 日志关联用
    pub run_id: String,
    pub outcome: FlowOutcome,
    pub formatted: String,
    /// 本次运行期间 LLM 客户端累计增加的 token 数；并发请求共享客户端时为近似值
    pub total_tokens: u64,
}

pub struct ResearchService {
    catalog: Arc<Catalog>,
    config: ResearchConfig,
    settings: FlowSettings,
    /// 键为 "{role}_{crew}"
    crews: Mutex<HashMap<String, Arc<dyn Crew>>>,
}

impl ResearchService {
    /// 配置名不存在时返回 NotFound
    pub fn new(catalog: Arc<Catalog>, config_name: &str, settings: FlowSettings) -> Result<Self, AppError> {
        let config = catalog.research_config(config_name)?;
        tracing::info!(
            config = %config.name,
            prompt_engineer = %config.prompt_engineer_crew,
            research = %config.research_crew,
            review = %config.research_review_crew,
            "resolved research config"
        );
        Ok(Self {
            catalog,
            config,
            settings,
            crews: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// 取角色对应的 Crew；构建失败返回 None（流程随后进入 Failed）
    pub fn crew_for(&self, role: CrewRole) -> Option<Arc<dyn Crew>> {
        let name = role.crew_name(&self.config);
        if name.trim().is_empty() {
            tracing::error!(role = role.as_str(), "no crew configured for role");
            return None;
        }
        let key = format!("{}_{}", role.as_str(), name);
        if let Some(crew) = self.crews.lock().ok()?.get(&key) {
            return Some(crew.clone());
        }
        let crew = self.catalog.build_crew(name);
        match &crew {
            Some(c) => {
                if let Ok(mut cache) = self.crews.lock() {
                    cache.insert(key, c.clone());
                }
            }
            None => tracing::error!(role = role.as_str(), crew = name, "failed to create crew"),
        }
        crew
    }

    pub async fn run(&self, prompt: &str) -> ResearchRun {
        let inputs = self.catalog.inputs().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load run inputs");
            Inputs::new()
        });
        let crews = ResearchCrews {
            prompt_engineer: self.crew_for(CrewRole::PromptEngineer),
            research: self.crew_for(CrewRole::Research),
            review: self.crew_for(CrewRole::Review),
        };
        let flow = ResearchFlow::new(crews, inputs, self.settings.clone());
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("research", run_id = %run_id, config = %self.config.name);
        let (prompt_before, completion_before, total_before) = self.catalog.token_usage();
        let outcome = flow.run(prompt).instrument(span.clone()).await;
        let (prompt_after, completion_after, total_after) = self.catalog.token_usage();
        let total_tokens = total_after.saturating_sub(total_before);
        span.in_scope(|| {
            tracing::info!(
                status = ?outcome.status,
                prompt_tokens = prompt_after.saturating_sub(prompt_before),
                completion_tokens = completion_after.saturating_sub(completion_before),
                total_tokens,
                "research finished"
            );
        });

        let formatted = format_result(&Value::String(outcome.result.clone()));
        let formatted = if formatted.trim().is_empty() {
            outcome.result.clone()
        } else {
            formatted
        };
        ResearchRun {
            run_id,
            outcome,
            formatted,
            total_tokens,
        }
    }
}
