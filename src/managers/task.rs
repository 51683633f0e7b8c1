//! Task 管理器：构建任务前必须先构建其 Agent

use std::sync::Arc;

use crate::crew::Task;
use crate::managers::{AgentManager, BuildCache};
use crate::store::{find_by_name, ConfigStore, TaskEntry};

pub struct TaskManager {
    store: Arc<ConfigStore>,
    agents: Arc<AgentManager>,
    cache: BuildCache<Task>,
}

impl TaskManager {
    pub fn new(store: Arc<ConfigStore>, agents: Arc<AgentManager>) -> Self {
        Self {
            store,
            agents,
            cache: BuildCache::new(),
        }
    }

    pub fn build(&self, name: &str) -> Option<Arc<Task>> {
        if let Some(task) = self.cache.get(name) {
            return Some(task);
        }
        let generation = self.cache.generation();
        let entries: Vec<TaskEntry> = match self.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(task = name, error = %e, "error loading tasks");
                return None;
            }
        };
        let Some(def) = find_by_name(&entries, name).cloned() else {
            tracing::error!(task = name, "no task data found");
            return None;
        };
        if def.agent.trim().is_empty() {
            tracing::error!(task = name, "no agent specified for task");
            return None;
        }
        let Some(agent) = self.agents.build(&def.agent) else {
            tracing::error!(task = name, agent = %def.agent, "could not create agent for task");
            return None;
        };

        let task = Arc::new(Task::new(def, agent));
        self.cache.insert_if_current(generation, name, task.clone());
        Some(task)
    }

    pub fn invalidate(&self, name: &str) {
        self.cache.invalidate(name);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
