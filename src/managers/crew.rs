//! Crew 管理器：所有引用的 Agent 与 Task 都能构建时才构建 Crew

use std::sync::Arc;

use crate::crew::{CrewSettings, LlmCrew};
use crate::llm::LlmClient;
use crate::managers::{AgentManager, BuildCache, TaskManager};
use crate::store::{find_by_name, ConfigStore, CrewEntry};

pub struct CrewManager {
    store: Arc<ConfigStore>,
    agents: Arc<AgentManager>,
    tasks: Arc<TaskManager>,
    llm: Arc<dyn LlmClient>,
    settings: CrewSettings,
    cache: BuildCache<LlmCrew>,
}

impl CrewManager {
    pub fn new(
        store: Arc<ConfigStore>,
        agents: Arc<AgentManager>,
        tasks: Arc<TaskManager>,
        llm: Arc<dyn LlmClient>,
        settings: CrewSettings,
    ) -> Self {
        Self {
            store,
            agents,
            tasks,
            llm,
            settings,
            cache: BuildCache::new(),
        }
    }

    /// 共享 LLM 客户端的累计 token 用量
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub fn build(&self, name: &str) -> Option<Arc<LlmCrew>> {
        if let Some(crew) = self.cache.get(name) {
            tracing::debug!(crew = name, "returning cached crew");
            return Some(crew);
        }
        let generation = self.cache.generation();
        let crew = self.assemble(name)?;
        if self.cache.insert_if_current(generation, name, crew.clone()) {
            tracing::info!(crew = name, "crew created and cached");
        } else {
            tracing::debug!(crew = name, "definitions changed during build, crew not cached");
        }
        Some(crew)
    }

    fn assemble(&self, name: &str) -> Option<Arc<LlmCrew>> {
        let entries: Vec<CrewEntry> = match self.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(crew = name, error = %e, "error loading crews");
                return None;
            }
        };
        let Some(def) = find_by_name(&entries, name).cloned() else {
            tracing::error!(crew = name, "no crew data found");
            return None;
        };
        if def.agents.is_empty() || def.tasks.is_empty() {
            tracing::error!(crew = name, "crew needs at least one agent and one task");
            return None;
        }

        let mut agents = Vec::with_capacity(def.agents.len());
        for agent_name in &def.agents {
            let Some(agent) = self.agents.build(agent_name) else {
                tracing::error!(crew = name, agent = %agent_name, "failed to create agent for crew");
                return None;
            };
            agents.push(agent);
        }
        let mut tasks = Vec::with_capacity(def.tasks.len());
        for task_name in &def.tasks {
            let Some(task) = self.tasks.build(task_name) else {
                tracing::error!(crew = name, task = %task_name, "failed to create task for crew");
                return None;
            };
            tasks.push(task);
        }

        Some(Arc::new(LlmCrew::new(
            name,
            agents,
            tasks,
            self.llm.clone(),
            self.settings.clone(),
        )))
    }

    pub fn invalidate(&self, name: &str) {
        self.cache.invalidate(name);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
