//! 任务结构化输出 schema
//!
//! 任务定义里的 output_schema 可写短名（`EngineeredPrompt`）、点分路径（`self_eval_crew.EngineeredPrompt`）
//! 或展示名（`Engineered Prompt`）；解析后用于 (1) 把 JSON Schema 注入任务 prompt，(2) 校验并规整 LLM 输出。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 改写后的 prompt 及改写理由
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EngineeredPrompt {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub prompt_change_rationale: String,
}

/// 评审状态：feedback 与 success_flag 驱动研究流程是否重试
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReviewState {
    #[serde(default)]
    pub counter: i64,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub prompt_change_rationale: String,
    #[serde(default)]
    pub research: String,
    #[serde(default)]
    pub success_flag: bool,
    #[serde(default)]
    pub feedback: String,
}

/// 以字典组织的研究结论
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResearchResults {
    pub results: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSchema {
    EngineeredPrompt,
    AnalysisReviewState,
    ResearchResults,
}

/// 供任务编辑界面选择的 schema 条目
#[derive(Debug, Clone, Serialize)]
pub struct SchemaOption {
    pub label: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

pub fn output_schema_catalog() -> Vec<SchemaOption> {
    vec![
        SchemaOption {
            label: "Engineered Prompt",
            path: "self_eval_crew.EngineeredPrompt",
            description: "Structures output as a prompt with rationale for changes. Use for prompt engineering tasks.",
        },
        SchemaOption {
            label: "Analysis Review State",
            path: "self_eval_crew.AnalysisReviewState",
            description: "Tracks analysis state with counter, prompt, rationale, and feedback. Use for review tasks.",
        },
        SchemaOption {
            label: "Research Results",
            path: "self_eval_crew.ResearchResults",
            description: "Organizes research findings in a structured dictionary format. Use for research tasks.",
        },
        SchemaOption {
            label: "None",
            path: "",
            description: "No specific output format required. Task will return raw output.",
        },
    ]
}

fn normalize<T: DeserializeOwned + Serialize>(value: Value) -> Result<Value, String> {
    let typed: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
    serde_json::to_value(typed).map_err(|e| e.to_string())
}

impl OutputSchema {
    /// 解析 schema 引用；空串、None 或未知名字返回 None
    pub fn parse(reference: &str) -> Option<Self> {
        let last = reference.trim().rsplit('.').next()?;
        let compact: String = last.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "EngineeredPrompt" => Some(Self::EngineeredPrompt),
            "AnalysisReviewState" => Some(Self::AnalysisReviewState),
            "ResearchResults" => Some(Self::ResearchResults),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EngineeredPrompt => "EngineeredPrompt",
            Self::AnalysisReviewState => "AnalysisReviewState",
            Self::ResearchResults => "ResearchResults",
        }
    }

    pub fn json_schema(&self) -> String {
        let schema = match self {
            Self::EngineeredPrompt => schema_for!(EngineeredPrompt),
            Self::AnalysisReviewState => schema_for!(AnalysisReviewState),
            Self::ResearchResults => schema_for!(ResearchResults),
        };
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    }

    /// 按 schema 反序列化再序列化：补全默认字段，类型不符时报错
    pub fn validate(&self, value: Value) -> Result<Value, String> {
        match self {
            Self::EngineeredPrompt => normalize::<EngineeredPrompt>(value),
            Self::AnalysisReviewState => normalize::<AnalysisReviewState>(value),
            Self::ResearchResults => normalize::<ResearchResults>(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reference_forms() {
        assert_eq!(OutputSchema::parse("EngineeredPrompt"), Some(OutputSchema::EngineeredPrompt));
        assert_eq!(
            OutputSchema::parse("self_eval_crew.AnalysisReviewState"),
            Some(OutputSchema::AnalysisReviewState)
        );
        assert_eq!(OutputSchema::parse("Research Results"), Some(OutputSchema::ResearchResults));
        assert_eq!(OutputSchema::parse(""), None);
        assert_eq!(OutputSchema::parse("None"), None);
        for option in output_schema_catalog() {
            if !option.path.is_empty() {
                assert!(OutputSchema::parse(option.path).is_some());
            }
        }
    }

    #[test]
    fn test_validate_fills_defaults() {
        let v = OutputSchema::AnalysisReviewState
            .validate(json!({"feedback": "more sources"}))
            .unwrap();
        assert_eq!(v["feedback"], "more sources");
        assert_eq!(v["success_flag"], false);

        assert!(OutputSchema::ResearchResults.validate(json!({"other": 1})).is_err());
        assert!(OutputSchema::EngineeredPrompt.json_schema().contains("prompt_change_rationale"));
    }
}
