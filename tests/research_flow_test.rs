//! 自评估研究流程集成测试

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crewbench::core::{AppError, CrewError};
use crewbench::crew::{Crew, CrewOutput, CrewSettings};
use crewbench::flow::{
    FlowSettings, FlowStatus, ResearchCrews, ResearchFlow, ResearchService, RESEARCH_NOT_COMPLETED,
};
use crewbench::llm::{LlmClient, MockLlmClient};
use crewbench::managers::Catalog;
use crewbench::store::{AgentDef, ConfigStore, CrewDef, Inputs, ResearchConfig, TaskDef};
use crewbench::tools::{DummyTool, ToolRegistry};

/// 按脚本依次返回结果；脚本耗尽后重复最后一项
struct ScriptedCrew {
    script: Vec<Result<CrewOutput, String>>,
    calls: Mutex<usize>,
}

impl ScriptedCrew {
    fn new(script: Vec<Result<CrewOutput, String>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Crew for ScriptedCrew {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, _inputs: &Inputs) -> Result<CrewOutput, CrewError> {
        let mut calls = self.calls.lock().unwrap();
        let i = (*calls).min(self.script.len() - 1);
        *calls += 1;
        self.script[i].clone().map_err(CrewError::Llm)
    }
}

fn review(success: bool) -> Result<CrewOutput, String> {
    Ok(CrewOutput::structured(
        "",
        json!({"feedback": if success { "looks good" } else { "add sources" }, "success_flag": success}),
    ))
}

fn settings(max_retries: u32) -> FlowSettings {
    FlowSettings {
        max_retries,
        engineer_first_attempt: false,
        invoke_timeout: Duration::from_secs(5),
    }
}

fn numbered_research(n: usize) -> Arc<ScriptedCrew> {
    ScriptedCrew::new(
        (1..=n)
            .map(|i| Ok(CrewOutput::raw(format!("research #{}", i))))
            .collect(),
    )
}

fn pe() -> Arc<ScriptedCrew> {
    ScriptedCrew::new(vec![Ok(CrewOutput::structured(
        "",
        json!({"prompt": "sharper prompt", "prompt_change_rationale": "feedback"}),
    ))])
}

#[tokio::test]
async fn test_always_false_review_returns_last_research() {
    let research = numbered_research(5);
    let reviewer = ScriptedCrew::new(vec![review(false)]);
    let flow = ResearchFlow::new(
        ResearchCrews {
            prompt_engineer: Some(pe()),
            research: Some(research.clone()),
            review: Some(reviewer.clone()),
        },
        Inputs::new(),
        settings(3),
    );

    let out = flow.run("what is the capital of Thailand").await;
    assert_eq!(out.status, FlowStatus::Failed);
    assert_eq!(out.result, "research #2");
    assert_ne!(out.result, RESEARCH_NOT_COMPLETED);
    assert_eq!(research.calls(), 2);
    assert_eq!(reviewer.calls(), 1);
}

#[tokio::test]
async fn test_never_succeeding_review_terminates_past_bound() {
    for n in 0..8u32 {
        let reviewer = ScriptedCrew::new(vec![review(false)]);
        let flow = ResearchFlow::new(
            ResearchCrews {
                prompt_engineer: Some(pe()),
                research: Some(numbered_research(10)),
                review: Some(reviewer.clone()),
            },
            Inputs::new(),
            settings(n),
        );
        let out = flow.run("q").await;
        assert_eq!(out.status, FlowStatus::Failed, "bound {}", n);
        assert!(out.state.counter > n, "bound {}", n);
        assert!(out.state.counter - n <= 3, "bound {}", n);
        // 评审发生在 counter = 1, 4, 7, ... 且不超过 n 时
        assert_eq!(reviewer.calls() as u32, (n + 2) / 3, "bound {}", n);
    }
}

#[tokio::test]
async fn test_success_at_iteration_k_returns_that_research() {
    for k in 1..=3usize {
        let mut verdicts: Vec<_> = (1..k).map(|_| review(false)).collect();
        verdicts.push(review(true));
        let flow = ResearchFlow::new(
            ResearchCrews {
                prompt_engineer: Some(pe()),
                research: Some(numbered_research(5)),
                review: Some(ScriptedCrew::new(verdicts)),
            },
            Inputs::new(),
            settings(10),
        );
        let out = flow.run("q").await;
        assert_eq!(out.status, FlowStatus::Success);
        assert_eq!(out.result, format!("research #{}", k));
        assert!(out.state.success_flag);
    }
}

#[tokio::test]
async fn test_failure_before_research_returns_sentinel() {
    let flow = ResearchFlow::new(
        ResearchCrews {
            prompt_engineer: Some(ScriptedCrew::new(vec![Err("down".into())])),
            research: Some(numbered_research(1)),
            review: Some(ScriptedCrew::new(vec![review(true)])),
        },
        Inputs::new(),
        FlowSettings {
            engineer_first_attempt: true,
            ..settings(3)
        },
    );
    let out = flow.run("q").await;
    assert_eq!(out.status, FlowStatus::Failed);
    assert_eq!(out.result, RESEARCH_NOT_COMPLETED);
}

#[tokio::test]
async fn test_missing_review_crew_fails_with_research() {
    let flow = ResearchFlow::new(
        ResearchCrews {
            prompt_engineer: None,
            research: Some(numbered_research(1)),
            review: None,
        },
        Inputs::new(),
        settings(3),
    );
    let out = flow.run("q").await;
    assert_eq!(out.status, FlowStatus::Failed);
    assert_eq!(out.result, "research #1");
}

fn agent(name: &str, tools: &[&str]) -> AgentDef {
    AgentDef {
        name: name.into(),
        role: name.into(),
        goal: "help".into(),
        backstory: String::new(),
        delegate: false,
        tools: tools.iter().map(|t| t.to_string()).collect(),
    }
}

fn task(name: &str, description: &str, agent: &str, schema: Option<&str>) -> TaskDef {
    TaskDef {
        name: name.into(),
        description: description.into(),
        expected_output: "answer".into(),
        agent: agent.into(),
        tools: vec![],
        output_schema: schema.map(str::to_string),
    }
}

fn crew(name: &str, agent: &str, task: &str) -> CrewDef {
    CrewDef {
        name: name.into(),
        agents: vec![agent.into()],
        tasks: vec![task.into()],
    }
}

fn research_catalog(dir: &std::path::Path, llm: Arc<MockLlmClient>) -> Arc<Catalog> {
    let mut tools = ToolRegistry::new();
    tools.register(DummyTool);
    let catalog = Catalog::new(
        Arc::new(ConfigStore::new(dir)),
        Arc::new(tools),
        llm,
        CrewSettings::default(),
    );
    catalog.add_agent(agent("engineer", &[])).unwrap();
    catalog.add_agent(agent("researcher", &["Dummy Tool"])).unwrap();
    catalog.add_agent(agent("reviewer", &[])).unwrap();
    catalog
        .add_task(task("improve", "Improve: {prompt} given {feedback}", "engineer", Some("EngineeredPrompt")))
        .unwrap();
    catalog.add_task(task("research", "Answer: {prompt}", "researcher", None)).unwrap();
    catalog
        .add_task(task("review", "Review: {research}", "reviewer", Some("AnalysisReviewState")))
        .unwrap();
    catalog.add_crew(crew("pe_crew", "engineer", "improve")).unwrap();
    catalog.add_crew(crew("research_crew", "researcher", "research")).unwrap();
    catalog.add_crew(crew("review_crew", "reviewer", "review")).unwrap();
    catalog
        .add_research_config(ResearchConfig {
            name: "smart".into(),
            prompt_engineer_crew: "pe_crew".into(),
            research_crew: "research_crew".into(),
            research_review_crew: "review_crew".into(),
        })
        .unwrap();
    Arc::new(catalog)
}

#[tokio::test]
async fn test_capital_of_thailand_without_prompt_engineering() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(MockLlmClient::scripted([
        r#"{"tool": "Dummy Tool", "args": {"question": "capital of Thailand"}}"#,
        "Bangkok",
        r#"{"feedback": "Correct", "success_flag": true}"#,
    ]));
    let catalog = research_catalog(dir.path(), llm.clone());
    let service = ResearchService::new(catalog, "smart", settings(3)).unwrap();

    let run = service.run("What is the capital of Thailand?").await;
    assert_eq!(run.outcome.status, FlowStatus::Success);
    assert_eq!(run.outcome.result, "Bangkok");
    assert_eq!(run.formatted, "Bangkok");
    // research 两轮（工具调用 + 回答）+ review 一轮；prompt 工程未被调用
    assert_eq!(llm.calls(), 3);
    assert!(run.total_tokens > 0);
    assert_eq!(run.total_tokens, llm.token_usage().2);
    let first = llm.request(0).unwrap();
    assert!(first.last().unwrap().content.contains("capital of Thailand"));
}

#[tokio::test]
async fn test_unknown_research_config() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = research_catalog(dir.path(), Arc::new(MockLlmClient::new()));
    assert!(matches!(
        ResearchService::new(catalog, "nope", settings(3)),
        Err(AppError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_config_with_broken_crew_fails_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = research_catalog(dir.path(), Arc::new(MockLlmClient::new()));
    catalog
        .add_research_config(ResearchConfig {
            name: "broken".into(),
            prompt_engineer_crew: "pe_crew".into(),
            research_crew: "missing_crew".into(),
            research_review_crew: "review_crew".into(),
        })
        .unwrap();
    let service = ResearchService::new(catalog, "broken", settings(3)).unwrap();
    let run = service.run("q").await;
    assert_eq!(run.outcome.status, FlowStatus::Failed);
    assert!(run.outcome.result.starts_with("Error performing research"));
}
