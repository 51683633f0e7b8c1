//! 配置文件中的实体定义
//!
//! YAML 中每个实体包一层单键对象：`- Agent: {...}`、`- Task: {...}`、`- Crew: {...}`。

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// 运行输入：合并进每次 Crew 调用的扁平键值
pub type Inputs = BTreeMap<String, String>;

/// YAML 中 `tools: ~` 与缺省都视为空列表
fn null_as_empty<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

/// 空字符串 / "None" 视为未设置
fn blank_as_none<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<String>::deserialize(d)?;
    Ok(v.filter(|s| {
        let s = s.trim();
        !s.is_empty() && s != "None"
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDef {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub delegate: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expected_output: String,
    /// 执行该任务的 Agent 名
    #[serde(default)]
    pub agent: String,
    /// Agent 工具的子集
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tools: Vec<String>,
    /// 结构化输出 schema（如 `EngineeredPrompt` 或 `self_eval_crew.EngineeredPrompt`）
    #[serde(
        default,
        alias = "pydantic_class",
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewDef {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub agents: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tasks: Vec<String>,
}

/// 自评估研究配置：三个角色各对应一个 Crew 名
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub name: String,
    #[serde(default)]
    pub prompt_engineer_crew: String,
    #[serde(default)]
    pub research_crew: String,
    #[serde(default)]
    pub research_review_crew: String,
}

/// smart_research.yaml 的根
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResearchConfigs {
    #[serde(default)]
    pub configs: Vec<ResearchConfig>,
}

impl ResearchConfigs {
    /// 首个同名配置
    pub fn find(&self, name: &str) -> Option<&ResearchConfig> {
        self.configs.iter().find(|c| c.name == name)
    }
}

/// 列表文件中的一个实体包装
pub trait Entry: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Def: Clone + Serialize + Send + Sync;
    /// 实体类别（日志与错误信息用）
    const KIND: &'static str;
    const FILE: &'static str;

    fn wrap(def: Self::Def) -> Self;
    fn def(&self) -> &Self::Def;
    fn name(&self) -> &str;
}

macro_rules! entry {
    ($entry:ident, $def:ident, $key:literal, $kind:literal, $file:literal) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $entry {
            #[serde(rename = $key)]
            pub inner: $def,
        }

        impl Entry for $entry {
            type Def = $def;
            const KIND: &'static str = $kind;
            const FILE: &'static str = $file;

            fn wrap(def: $def) -> Self {
                Self { inner: def }
            }

            fn def(&self) -> &$def {
                &self.inner
            }

            fn name(&self) -> &str {
                &self.inner.name
            }
        }
    };
}

entry!(AgentEntry, AgentDef, "Agent", "agent", "agents.yaml");
entry!(TaskEntry, TaskDef, "Task", "task", "tasks.yaml");
entry!(CrewEntry, CrewDef, "Crew", "crew", "crews.yaml");

/// 首个同名实体
pub fn find_by_name<'a, E: Entry>(entries: &'a [E], name: &str) -> Option<&'a E::Def> {
    entries.iter().find(|e| e.name() == name).map(Entry::def)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_yaml_shape() {
        let yaml = r#"
- Agent:
    name: researcher
    role: Researcher
    goal: Find facts
    backstory: Curious
    tools:
      - Dummy Tool
- Agent:
    name: writer
    role: Writer
    goal: Write
    backstory: Terse
    delegate: true
    tools: ~
"#;
        let agents: Vec<AgentEntry> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].inner.tools, vec!["Dummy Tool".to_string()]);
        assert!(!agents[0].inner.delegate);
        assert!(agents[1].inner.delegate);
        assert!(agents[1].inner.tools.is_empty());

        let out = serde_yaml::to_string(&agents).unwrap();
        assert!(out.contains("Agent:"));
    }

    #[test]
    fn test_task_accepts_pydantic_class_alias() {
        let yaml = r#"
- Task:
    name: engineer
    description: Improve {prompt}
    expected_output: Better prompt
    agent: pe
    pydantic_class: self_eval_crew.EngineeredPrompt
- Task:
    name: raw
    description: d
    agent: pe
    pydantic_class: ''
"#;
        let tasks: Vec<TaskEntry> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            tasks[0].inner.output_schema.as_deref(),
            Some("self_eval_crew.EngineeredPrompt")
        );
        assert!(tasks[1].inner.output_schema.is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let entries = vec![
            CrewEntry::wrap(CrewDef {
                name: "dup".into(),
                agents: vec!["a".into()],
                tasks: vec![],
            }),
            CrewEntry::wrap(CrewDef {
                name: "dup".into(),
                agents: vec!["b".into()],
                tasks: vec![],
            }),
        ];
        assert_eq!(find_by_name(&entries, "dup").unwrap().agents, vec!["a"]);
        assert!(find_by_name(&entries, "missing").is_none());
    }
}
