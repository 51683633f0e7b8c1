//! Catalog：配置 CRUD 与缓存失效的统一入口
//!
//! 写入经 ConfigStore::update 串行化；新增 / 改名时拒绝重名。
//! 改 Agent 会失效所有 Task 与 Crew 缓存，改 Task 会失效所有 Crew 缓存。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::AppError;
use crate::crew::{Crew, CrewOutput, CrewSettings};
use crate::llm::LlmClient;
use crate::managers::{AgentManager, CrewManager, TaskManager};
use crate::store::{
    AgentDef, AgentEntry, ConfigStore, CrewDef, CrewEntry, Entry, Inputs, ResearchConfig,
    ResearchConfigs, TaskDef, TaskEntry,
};
use crate::tools::ToolRegistry;

pub struct Catalog {
    store: Arc<ConfigStore>,
    agents: Arc<AgentManager>,
    tasks: Arc<TaskManager>,
    crews: Arc<CrewManager>,
    last_results: Mutex<HashMap<String, CrewOutput>>,
}

fn check_name(kind: &'static str, name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidRequest(format!("{} name is required", kind)));
    }
    Ok(())
}

/// 末尾追加；同名已存在时拒绝
fn add_entry<E: Entry>(entries: &mut Vec<E>, def: E::Def) -> Result<(), AppError> {
    let entry = E::wrap(def);
    check_name(E::KIND, entry.name())?;
    if entries.iter().any(|e| e.name() == entry.name()) {
        return Err(AppError::DuplicateName {
            kind: E::KIND,
            name: entry.name().to_string(),
        });
    }
    entries.push(entry);
    Ok(())
}

/// 替换 index 处的条目并返回旧名；新名与其他条目重名时拒绝
fn edit_entry<E: Entry>(entries: &mut [E], index: usize, def: E::Def) -> Result<String, AppError> {
    let entry = E::wrap(def);
    check_name(E::KIND, entry.name())?;
    if index >= entries.len() {
        return Err(AppError::IndexOutOfRange(index));
    }
    if entries
        .iter()
        .enumerate()
        .any(|(i, e)| i != index && e.name() == entry.name())
    {
        return Err(AppError::DuplicateName {
            kind: E::KIND,
            name: entry.name().to_string(),
        });
    }
    let old = std::mem::replace(&mut entries[index], entry);
    Ok(old.name().to_string())
}

fn delete_entry<E: Entry>(entries: &mut Vec<E>, index: usize) -> Result<String, AppError> {
    if index >= entries.len() {
        return Err(AppError::IndexOutOfRange(index));
    }
    Ok(entries.remove(index).name().to_string())
}

fn defs<E: Entry>(entries: Vec<E>) -> Vec<E::Def> {
    entries.iter().map(|e| e.def().clone()).collect()
}

impl Catalog {
    pub fn new(
        store: Arc<ConfigStore>,
        tools: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        settings: CrewSettings,
    ) -> Self {
        let agents = Arc::new(AgentManager::new(store.clone(), tools));
        let tasks = Arc::new(TaskManager::new(store.clone(), agents.clone()));
        let crews = Arc::new(CrewManager::new(
            store.clone(),
            agents.clone(),
            tasks.clone(),
            llm,
            settings,
        ));
        Self {
            store,
            agents,
            tasks,
            crews,
            last_results: Mutex::new(HashMap::new()),
        }
    }

    pub fn agent_manager(&self) -> &AgentManager {
        &self.agents
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.crews.token_usage()
    }

    pub fn available_tools(&self) -> Vec<String> {
        self.agents.tools().tool_names()
    }

    // ---- agents ----

    pub fn agents(&self) -> Result<Vec<AgentDef>, AppError> {
        Ok(defs(self.store.load::<Vec<AgentEntry>>()?))
    }

    pub fn add_agent(&self, def: AgentDef) -> Result<Vec<AgentDef>, AppError> {
        let name = def.name.clone();
        let entries = self
            .store
            .update::<Vec<AgentEntry>, _, _>(|entries| {
                add_entry(entries, def)?;
                Ok(entries.clone())
            })?;
        tracing::info!(agent = %name, "agent added");
        self.on_agent_changed(&name, &name);
        Ok(defs(entries))
    }

    pub fn edit_agent(&self, index: usize, def: AgentDef) -> Result<Vec<AgentDef>, AppError> {
        let name = def.name.clone();
        let (old, entries) = self
            .store
            .update::<Vec<AgentEntry>, _, _>(|entries| {
                let old = edit_entry(entries, index, def)?;
                Ok((old, entries.clone()))
            })?;
        tracing::info!(agent = %name, index, "agent updated");
        self.on_agent_changed(&old, &name);
        Ok(defs(entries))
    }

    pub fn delete_agent(&self, index: usize) -> Result<Vec<AgentDef>, AppError> {
        let (old, entries) = self
            .store
            .update::<Vec<AgentEntry>, _, _>(|entries| {
                let old = delete_entry(entries, index)?;
                Ok((old, entries.clone()))
            })?;
        tracing::info!(agent = %old, index, "agent deleted");
        self.on_agent_changed(&old, &old);
        Ok(defs(entries))
    }

    fn on_agent_changed(&self, old: &str, new: &str) {
        self.agents.invalidate(old);
        self.agents.invalidate(new);
        self.tasks.clear();
        self.crews.clear();
    }

    // ---- tasks ----

    pub fn tasks(&self) -> Result<Vec<TaskDef>, AppError> {
        Ok(defs(self.store.load::<Vec<TaskEntry>>()?))
    }

    pub fn add_task(&self, def: TaskDef) -> Result<Vec<TaskDef>, AppError> {
        let name = def.name.clone();
        let entries = self.store.update::<Vec<TaskEntry>, _, _>(|entries| {
            add_entry(entries, def)?;
            Ok(entries.clone())
        })?;
        tracing::info!(task = %name, "task added");
        self.on_task_changed(&name, &name);
        Ok(defs(entries))
    }

    pub fn edit_task(&self, index: usize, def: TaskDef) -> Result<Vec<TaskDef>, AppError> {
        let name = def.name.clone();
        let (old, entries) = self.store.update::<Vec<TaskEntry>, _, _>(|entries| {
            let old = edit_entry(entries, index, def)?;
            Ok((old, entries.clone()))
        })?;
        tracing::info!(task = %name, index, "task updated");
        self.on_task_changed(&old, &name);
        Ok(defs(entries))
    }

    pub fn delete_task(&self, index: usize) -> Result<Vec<TaskDef>, AppError> {
        let (old, entries) = self.store.update::<Vec<TaskEntry>, _, _>(|entries| {
            let old = delete_entry(entries, index)?;
            Ok((old, entries.clone()))
        })?;
        tracing::info!(task = %old, index, "task deleted");
        self.on_task_changed(&old, &old);
        Ok(defs(entries))
    }

    fn on_task_changed(&self, old: &str, new: &str) {
        self.tasks.invalidate(old);
        self.tasks.invalidate(new);
        self.crews.clear();
    }

    // ---- crews ----

    pub fn crews(&self) -> Result<Vec<CrewDef>, AppError> {
        Ok(defs(self.store.load::<Vec<CrewEntry>>()?))
    }

    pub fn crew_names(&self) -> Vec<String> {
        self.crews()
            .map(|c| c.into_iter().map(|d| d.name).collect())
            .unwrap_or_default()
    }

    pub fn add_crew(&self, def: CrewDef) -> Result<Vec<CrewDef>, AppError> {
        let name = def.name.clone();
        let entries = self.store.update::<Vec<CrewEntry>, _, _>(|entries| {
            add_entry(entries, def)?;
            Ok(entries.clone())
        })?;
        tracing::info!(crew = %name, "crew added");
        self.crews.invalidate(&name);
        Ok(defs(entries))
    }

    pub fn edit_crew(&self, index: usize, def: CrewDef) -> Result<Vec<CrewDef>, AppError> {
        let name = def.name.clone();
        let (old, entries) = self.store.update::<Vec<CrewEntry>, _, _>(|entries| {
            let old = edit_entry(entries, index, def)?;
            Ok((old, entries.clone()))
        })?;
        tracing::info!(crew = %name, index, "crew updated");
        self.crews.invalidate(&old);
        self.crews.invalidate(&name);
        Ok(defs(entries))
    }

    pub fn delete_crew(&self, index: usize) -> Result<Vec<CrewDef>, AppError> {
        let (old, entries) = self.store.update::<Vec<CrewEntry>, _, _>(|entries| {
            let old = delete_entry(entries, index)?;
            Ok((old, entries.clone()))
        })?;
        tracing::info!(crew = %old, index, "crew deleted");
        self.crews.invalidate(&old);
        Ok(defs(entries))
    }

    /// 构建 Crew；任一 Agent / Task 无法解析时返回 None
    pub fn build_crew(&self, name: &str) -> Option<Arc<dyn Crew>> {
        self.crews.build(name).map(|c| c as Arc<dyn Crew>)
    }

    // ---- inputs ----

    pub fn inputs(&self) -> Result<Inputs, AppError> {
        Ok(self.store.load::<Inputs>()?)
    }

    /// 新增或修改一个输入；名称或值为空时不做改动
    pub fn set_input(&self, name: &str, value: &str) -> Result<Inputs, AppError> {
        self.store.update::<Inputs, _, _>(|inputs| {
            if !name.trim().is_empty() && !value.is_empty() {
                inputs.insert(name.trim().to_string(), value.to_string());
            }
            Ok(inputs.clone())
        })
    }

    pub fn delete_input(&self, name: &str) -> Result<Inputs, AppError> {
        self.store.update::<Inputs, _, _>(|inputs| {
            inputs.remove(name);
            Ok(inputs.clone())
        })
    }

    // ---- research configs ----

    pub fn research_configs(&self) -> Result<Vec<ResearchConfig>, AppError> {
        Ok(self.store.load::<ResearchConfigs>()?.configs)
    }

    pub fn research_config(&self, name: &str) -> Result<ResearchConfig, AppError> {
        self.store
            .load::<ResearchConfigs>()?
            .find(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound {
                kind: "research config",
                name: name.to_string(),
            })
    }

    pub fn add_research_config(&self, cfg: ResearchConfig) -> Result<Vec<ResearchConfig>, AppError> {
        check_name("research config", &cfg.name)?;
        self.store.update::<ResearchConfigs, _, _>(|doc| {
            if doc.find(&cfg.name).is_some() {
                return Err(AppError::DuplicateName {
                    kind: "research config",
                    name: cfg.name.clone(),
                });
            }
            doc.configs.push(cfg);
            Ok(doc.configs.clone())
        })
    }

    /// 按名替换首个同名配置
    pub fn edit_research_config(&self, cfg: ResearchConfig) -> Result<Vec<ResearchConfig>, AppError> {
        check_name("research config", &cfg.name)?;
        self.store.update::<ResearchConfigs, _, _>(|doc| {
            let slot = doc
                .configs
                .iter_mut()
                .find(|c| c.name == cfg.name)
                .ok_or_else(|| AppError::NotFound {
                    kind: "research config",
                    name: cfg.name.clone(),
                })?;
            *slot = cfg;
            Ok(doc.configs.clone())
        })
    }

    pub fn delete_research_config(&self, name: &str) -> Result<Vec<ResearchConfig>, AppError> {
        self.store.update::<ResearchConfigs, _, _>(|doc| {
            doc.configs.retain(|c| c.name != name);
            Ok(doc.configs.clone())
        })
    }

    // ---- execution ----

    /// 构建并运行一个 Crew（输入为 inputs.json），记录该 Crew 最近一次结果
    pub async fn execute_crew(&self, name: &str) -> Result<CrewOutput, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidRequest("No crew name provided".to_string()));
        }
        let crew = self
            .crews
            .build(name)
            .ok_or_else(|| AppError::CrewUnavailable(name.to_string()))?;
        let inputs = self.inputs()?;
        let output = crew.kickoff(&inputs).await.map_err(|e| {
            tracing::error!(crew = name, error = %e, "error executing crew");
            AppError::Crew(e)
        })?;
        if let Ok(mut last) = self.last_results.lock() {
            last.insert(name.to_string(), output.clone());
        }
        Ok(output)
    }

    pub fn last_result(&self, name: &str) -> Option<CrewOutput> {
        self.last_results.lock().ok()?.get(name).cloned()
    }
}
