//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找；
//! Agent 运行时按名从注册表中取出自己的工具子集。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（配置文件中 tools 列表引用的名字，也是 tool call 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认单个 question 字符串
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": { "type": "string" }
            },
            "required": ["question"]
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 从参数中取文本：args 为字符串时先尝试按 JSON 对象解析，再按 keys 顺序取首个字符串字段
pub fn text_arg(args: &Value, keys: &[&str]) -> Option<String> {
    let from_object = |v: &Value| {
        keys.iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    };
    let text = match args {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(obj @ Value::Object(_)) => from_object(&obj),
            _ => Some(s.clone()),
        },
        Value::Object(_) => from_object(args),
        _ => None,
    };
    text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，名称有序便于展示
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, String> {
        let tool = self.tools.get(name).ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 返回 (name, description, args schema) 列表，用于生成 prompt 中的工具段落
    pub fn tool_descriptions(&self) -> Vec<(String, String, Value)> {
        self.tools
            .iter()
            .map(|(name, tool)| {
                (
                    name.clone(),
                    tool.description().to_string(),
                    tool.parameters_schema(),
                )
            })
            .collect()
    }

    /// 仅包含 names 中存在的工具的子注册表；未知名字记录日志后跳过
    pub fn subset(&self, names: &[String], owner: &str) -> ToolRegistry {
        let mut sub = ToolRegistry::new();
        for name in names {
            match self.get(name) {
                Some(tool) => sub.register_arc(tool),
                None => tracing::warn!(tool = %name, owner, "unknown tool skipped"),
            }
        }
        sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn description(&self) -> &str {
            "Uppercase the question"
        }
        async fn execute(&self, args: Value) -> Result<String, String> {
            text_arg(&args, &["question"])
                .map(|s| s.to_uppercase())
                .ok_or_else(|| "missing question".to_string())
        }
    }

    #[test]
    fn test_text_arg_variants() {
        assert_eq!(
            text_arg(&serde_json::json!({"question": " hi "}), &["question"]).as_deref(),
            Some("hi")
        );
        assert_eq!(
            text_arg(&Value::String(r#"{"question":"x"}"#.into()), &["question"]).as_deref(),
            Some("x")
        );
        assert_eq!(
            text_arg(&Value::String("plain".into()), &["question"]).as_deref(),
            Some("plain")
        );
        assert_eq!(text_arg(&serde_json::json!({"other": 1}), &["question"]), None);
    }

    #[tokio::test]
    async fn test_registry_execute_and_subset() {
        let mut reg = ToolRegistry::new();
        reg.register(Upper);
        assert_eq!(
            reg.execute("upper", serde_json::json!({"question": "abc"})).await.unwrap(),
            "ABC"
        );
        assert!(reg.execute("nope", Value::Null).await.is_err());

        let sub = reg.subset(&["upper".to_string(), "ghost".to_string()], "agent-a");
        assert_eq!(sub.tool_names(), vec!["upper".to_string()]);
        let (name, _, args) = &reg.tool_descriptions()[0];
        assert_eq!(name, "upper");
        assert_eq!(args["required"][0], "question");
    }
}
