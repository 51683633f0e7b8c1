//! 顺序执行的 LLM Crew
//!
//! 每个 Task 由其 Agent 执行：system prompt 描述角色与可用工具，user prompt 为插值后的任务描述，
//! 上一个任务的输出作为上下文传给下一个任务。Agent 可输出 `{"tool": ..., "args": {...}}` 调用工具，
//! 观察结果回填后继续，直到给出最终答案或用尽工具轮数。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AppConfig;
use crate::core::CrewError;
use crate::crew::{extract_json, invoke_with_timeout, reject_html_page, Crew, CrewOutput, OutputSchema};
use crate::llm::{LlmClient, Message};
use crate::store::{AgentDef, Inputs, TaskDef};
use crate::tools::{tool_call_schema_json, ToolExecutor, ToolRegistry};

/// 运行时参数
#[derive(Debug, Clone)]
pub struct CrewSettings {
    pub max_tool_steps: usize,
    pub tool_timeout_secs: u64,
    pub invoke_timeout_secs: u64,
}

impl CrewSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_tool_steps: cfg.crew.max_tool_steps,
            tool_timeout_secs: cfg.tools.tool_timeout_secs,
            invoke_timeout_secs: cfg.crew.invoke_timeout_secs,
        }
    }
}

impl Default for CrewSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 已解析工具的 Agent
#[derive(Clone)]
pub struct Agent {
    pub def: AgentDef,
    pub tools: ToolRegistry,
}

impl Agent {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    fn system_prompt(&self, tools: &ToolRegistry) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.def.role, self.def.backstory, self.def.goal
        );
        if !tools.is_empty() {
            prompt.push_str("\n\nYou can use these tools:\n");
            for (name, desc, args) in tools.tool_descriptions() {
                prompt.push_str(&format!("- {}: {} (args: {})\n", name, desc, args));
            }
            prompt.push_str(
                "\nTo use a tool, reply with ONLY a JSON object matching this schema:\n",
            );
            prompt.push_str(&tool_call_schema_json());
            prompt.push_str(
                "\nWhen you have the final answer, reply with the answer itself and no tool call.",
            );
        }
        prompt
    }
}

/// 已解析 Agent、工具与输出 schema 的 Task
#[derive(Clone)]
pub struct Task {
    pub def: TaskDef,
    pub agent: Arc<Agent>,
    /// 任务工具：任务指定的 Agent 工具子集；未指定或均不匹配时沿用 Agent 全部工具
    pub tools: ToolRegistry,
    pub schema: Option<OutputSchema>,
}

impl Task {
    pub fn new(def: TaskDef, agent: Arc<Agent>) -> Self {
        let subset = agent.tools.subset(&def.tools, &def.name);
        let tools = if subset.is_empty() {
            agent.tools.clone()
        } else {
            subset
        };
        let schema = def.output_schema.as_deref().and_then(|s| {
            let parsed = OutputSchema::parse(s);
            if parsed.is_none() {
                tracing::warn!(task = %def.name, schema = s, "unknown output schema, using raw output");
            }
            parsed
        });
        Self {
            def,
            agent,
            tools,
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    fn user_prompt(&self, inputs: &Inputs, context: Option<&str>) -> String {
        let mut prompt = format!("Task: {}\n", interpolate(&self.def.description, inputs));
        if !self.def.expected_output.is_empty() {
            prompt.push_str(&format!(
                "\nExpected output: {}\n",
                interpolate(&self.def.expected_output, inputs)
            ));
        }
        if let Some(ctx) = context {
            prompt.push_str(&format!("\nContext from the previous task:\n{}\n", ctx));
        }
        if let Some(schema) = self.schema {
            prompt.push_str(&format!(
                "\nYour final answer must be a JSON object matching this schema:\n{}\n",
                schema.json_schema()
            ));
        }
        prompt
    }
}

/// 把模板中的 `{key}` 替换为 inputs 中的值；没有对应输入的占位符原样保留
pub fn interpolate(template: &str, inputs: &Inputs) -> String {
    let mut out = template.to_string();
    for (key, value) in inputs {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

/// 解析工具调用：JSON 对象且 tool 字段非空
fn parse_tool_call(reply: &str) -> Option<(String, Value)> {
    let v = extract_json(reply)?;
    let tool = v.get("tool")?.as_str()?.trim().to_string();
    if tool.is_empty() {
        return None;
    }
    let args = v.get("args").cloned().unwrap_or(Value::Null);
    Some((tool, args))
}

/// 基于 LlmClient 的顺序 Crew
pub struct LlmCrew {
    name: String,
    agents: Vec<Arc<Agent>>,
    tasks: Vec<Arc<Task>>,
    llm: Arc<dyn LlmClient>,
    settings: CrewSettings,
}

impl LlmCrew {
    pub fn new(
        name: impl Into<String>,
        agents: Vec<Arc<Agent>>,
        tasks: Vec<Arc<Task>>,
        llm: Arc<dyn LlmClient>,
        settings: CrewSettings,
    ) -> Self {
        Self {
            name: name.into(),
            agents,
            tasks,
            llm,
            settings,
        }
    }

    /// 带总超时调用
    pub async fn kickoff(&self, inputs: &Inputs) -> Result<CrewOutput, CrewError> {
        invoke_with_timeout(
            self,
            inputs,
            Duration::from_secs(self.settings.invoke_timeout_secs),
        )
        .await
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, CrewError> {
        self.llm.complete(messages).await.map_err(CrewError::Llm)
    }

    async fn run_task(
        &self,
        task: &Task,
        inputs: &Inputs,
        context: Option<&str>,
    ) -> Result<CrewOutput, CrewError> {
        let executor = ToolExecutor::new(task.tools.clone(), self.settings.tool_timeout_secs);
        let mut messages = vec![
            Message::system(task.agent.system_prompt(&task.tools)),
            Message::user(task.user_prompt(inputs, context)),
        ];

        let mut reply = self.complete(&messages).await?;
        let mut steps = 0;
        while !task.tools.is_empty() {
            let Some((tool, args)) = parse_tool_call(&reply) else {
                break;
            };
            if steps >= self.settings.max_tool_steps {
                messages.push(Message::assistant(reply));
                messages.push(Message::user(
                    "Tool budget exhausted. Give your final answer now without calling tools.",
                ));
                reply = self.complete(&messages).await?;
                break;
            }
            steps += 1;
            let observation = match executor.execute(&tool, args).await {
                Ok(out) => out,
                Err(e) => format!("Tool error: {}", e),
            };
            tracing::debug!(crew = %self.name, task = task.name(), tool = %tool, step = steps, "tool observation");
            messages.push(Message::assistant(reply));
            messages.push(Message::user(format!("Observation: {}", observation)));
            reply = self.complete(&messages).await?;
        }

        reject_html_page(&reply).map_err(CrewError::Llm)?;

        let structured = task.schema.and_then(|schema| {
            let validated = extract_json(&reply).map(|v| schema.validate(v));
            match validated {
                Some(Ok(v)) => Some(v),
                Some(Err(e)) => {
                    tracing::warn!(task = task.name(), schema = schema.name(), error = %e, "structured output did not match schema");
                    None
                }
                None => {
                    tracing::warn!(task = task.name(), schema = schema.name(), "no JSON in task output");
                    None
                }
            }
        });

        Ok(CrewOutput {
            raw: reply,
            structured,
        })
    }
}

#[async_trait]
impl Crew for LlmCrew {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, inputs: &Inputs) -> Result<CrewOutput, CrewError> {
        if self.tasks.is_empty() {
            return Err(CrewError::NoTasks);
        }
        let agents: Vec<&str> = self.agents.iter().map(|a| a.def.name.as_str()).collect();
        tracing::info!(crew = %self.name, agents = ?agents, tasks = self.tasks.len(), "crew kickoff");
        let mut last: Option<CrewOutput> = None;
        for task in &self.tasks {
            let context = last.as_ref().map(|o| o.raw.as_str());
            let output = self.run_task(task, inputs, context).await?;
            tracing::debug!(crew = %self.name, task = task.name(), chars = output.raw.len(), "task finished");
            last = Some(output);
        }
        last.ok_or(CrewError::NoTasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::DummyTool;

    fn agent(tools: ToolRegistry) -> Arc<Agent> {
        Arc::new(Agent {
            def: AgentDef {
                name: "researcher".into(),
                role: "Researcher".into(),
                goal: "Answer questions".into(),
                backstory: "Careful".into(),
                delegate: false,
                tools: tools.tool_names(),
            },
            tools,
        })
    }

    fn task(name: &str, schema: Option<&str>, a: Arc<Agent>) -> Arc<Task> {
        Arc::new(Task::new(
            TaskDef {
                name: name.into(),
                description: "Research {prompt}".into(),
                expected_output: "An answer".into(),
                agent: a.def.name.clone(),
                tools: vec![],
                output_schema: schema.map(str::to_string),
            },
            a,
        ))
    }

    fn inputs(prompt: &str) -> Inputs {
        let mut i = Inputs::new();
        i.insert("prompt".into(), prompt.into());
        i
    }

    #[test]
    fn test_interpolate() {
        let mut i = inputs("Thailand");
        i.insert("year".into(), "2024".into());
        assert_eq!(
            interpolate("Capital of {prompt} in {year}, {missing}", &i),
            "Capital of Thailand in 2024, {missing}"
        );
    }

    #[tokio::test]
    async fn test_tasks_run_in_order_with_context() {
        let llm = Arc::new(MockLlmClient::scripted(["first answer", "second answer"]));
        let a = agent(ToolRegistry::new());
        let crew = LlmCrew::new(
            "c",
            vec![a.clone()],
            vec![task("t1", None, a.clone()), task("t2", None, a)],
            llm.clone(),
            CrewSettings::default(),
        );
        let out = crew.kickoff(&inputs("Thailand")).await.unwrap();
        assert_eq!(out.raw, "second answer");
        assert!(out.structured.is_none());
        assert_eq!(llm.calls(), 2);
        let first = llm.request(0).unwrap();
        assert!(first[1].content.contains("Research Thailand"));
        let second = llm.request(1).unwrap();
        assert!(second[1].content.contains("first answer"));
    }

    #[tokio::test]
    async fn test_tool_call_loop_and_structured_output() {
        let llm = Arc::new(MockLlmClient::scripted([
            r#"{"tool": "Dummy Tool", "args": {"question": "capital?"}}"#,
            "```json\n{\"prompt\": \"better\", \"prompt_change_rationale\": \"clearer\"}\n```",
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(DummyTool);
        let a = agent(tools);
        let crew = LlmCrew::new(
            "c",
            vec![a.clone()],
            vec![task("t", Some("self_eval_crew.EngineeredPrompt"), a)],
            llm.clone(),
            CrewSettings::default(),
        );
        let out = crew.invoke(&inputs("x")).await.unwrap();
        assert_eq!(out.field_str("prompt").as_deref(), Some("better"));
        let second = llm.request(1).unwrap();
        assert!(second.last().unwrap().content.contains("SinkingBangkok"));
    }

    #[tokio::test]
    async fn test_tool_budget_is_enforced() {
        let call = r#"{"tool": "Dummy Tool", "args": {"question": "q"}}"#;
        let llm = Arc::new(MockLlmClient::scripted([call, call, call, "final"]));
        let mut tools = ToolRegistry::new();
        tools.register(DummyTool);
        let a = agent(tools);
        let settings = CrewSettings {
            max_tool_steps: 2,
            ..CrewSettings::default()
        };
        let crew = LlmCrew::new("c", vec![a.clone()], vec![task("t", None, a)], llm.clone(), settings);
        let out = crew.invoke(&Inputs::new()).await.unwrap();
        assert_eq!(out.raw, "final");
        assert_eq!(llm.calls(), 4);
    }

    #[tokio::test]
    async fn test_empty_crew_has_no_tasks() {
        let crew = LlmCrew::new(
            "empty",
            vec![],
            vec![],
            Arc::new(MockLlmClient::new()),
            CrewSettings::default(),
        );
        assert!(matches!(crew.invoke(&Inputs::new()).await, Err(CrewError::NoTasks)));
    }
}
