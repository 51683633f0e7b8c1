//! Crew 输出与 JSON 提取

use serde::Serialize;
use serde_json::Value;

/// 一次 Crew 调用的结果：最后一个任务的原始文本，以及按 schema 解析出的结构化对象（若有）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrewOutput {
    pub raw: String,
    pub structured: Option<Value>,
}

impl CrewOutput {
    pub fn raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            structured: None,
        }
    }

    pub fn structured(raw: impl Into<String>, value: Value) -> Self {
        Self {
            raw: raw.into(),
            structured: Some(value),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.structured.as_ref().and_then(|v| v.get(key))
    }

    pub fn field_str(&self, key: &str) -> Option<String> {
        self.field(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn field_bool(&self, key: &str) -> Option<bool> {
        self.field(key).and_then(Value::as_bool)
    }

    /// 对外返回的结果：结构化 results 字段 > 结构化对象 > 原始文本
    pub fn result_value(&self) -> Value {
        match &self.structured {
            Some(v) => v.get("results").cloned().unwrap_or_else(|| v.clone()),
            None => Value::String(self.raw.clone()),
        }
    }
}

/// 从 LLM 文本中取出 JSON：优先 ```json 代码块，其次首个 '{' 到最后一个 '}'
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let candidate = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end < start {
            return None;
        }
        &trimmed[start..=end]
    };
    serde_json::from_str(candidate).ok()
}

/// 任务回答若是整页 HTML（网关错误页等）视为调用失败
pub fn reject_html_page(raw: &str) -> Result<(), String> {
    let s = raw.trim_start();
    if s.starts_with("<!DOCTYPE") || s.starts_with("<html") {
        tracing::error!("received HTML content instead of an answer");
        return Err("Invalid response format received".to_string());
    }
    Ok(())
}
