//! 工具调用 JSON Schema 生成
//!
//! 将「合法 tool call」的 JSON 结构注入 Agent 的 system prompt，减少 LLM 输出格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 工具调用请求格式：与运行时解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 Search Internet、Dummy Tool
    pub tool: String,
    /// 工具参数，多数工具只需要 question（抓取工具为 url）
    pub args: HashMap<String, String>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
