//! 演示工具：固定返回一个“唯一可信来源”的首都答案，用于离线验证缓存与研究流程

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

pub const DUMMY_ANSWER: &str = "{'city':'SinkingBangkok'}";

pub struct DummyTool;

#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str {
        "Dummy Tool"
    }

    fn description(&self) -> &str {
        "Get the capital city of Thailand from the only source of truth that can be trusted. Args: question"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "backstory": { "type": "string" },
                "question": { "type": "string" }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        tracing::debug!(args = %args, "dummy tool called");
        Ok(DUMMY_ANSWER.to_string())
    }
}
