//! Agent 管理器

use std::sync::Arc;

use crate::crew::Agent;
use crate::managers::BuildCache;
use crate::store::{find_by_name, AgentEntry, ConfigStore};
use crate::tools::ToolRegistry;

pub struct AgentManager {
    store: Arc<ConfigStore>,
    tools: Arc<ToolRegistry>,
    cache: BuildCache<Agent>,
}

impl AgentManager {
    pub fn new(store: Arc<ConfigStore>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            store,
            tools,
            cache: BuildCache::new(),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// 按名构建 Agent；定义缺失或文件损坏时记录日志并返回 None
    pub fn build(&self, name: &str) -> Option<Arc<Agent>> {
        if let Some(agent) = self.cache.get(name) {
            tracing::debug!(agent = name, "agent served from cache");
            return Some(agent);
        }
        let generation = self.cache.generation();
        let entries: Vec<AgentEntry> = match self.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(agent = name, error = %e, "error loading agents");
                return None;
            }
        };
        let Some(def) = find_by_name(&entries, name).cloned() else {
            tracing::error!(agent = name, "no agent data found");
            return None;
        };

        let tools = self.tools.subset(&def.tools, &def.name);
        if def.delegate {
            tracing::debug!(agent = name, "delegation requested, agents run sequentially");
        }
        let agent = Arc::new(Agent { def, tools });
        self.cache.insert_if_current(generation, name, agent.clone());
        Some(agent)
    }

    pub fn invalidate(&self, name: &str) {
        if self.cache.invalidate(name) {
            tracing::debug!(agent = name, "agent cache entry invalidated");
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains(name)
    }
}
