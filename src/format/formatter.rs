//! 把 Crew 结果渲染成可读文本

use regex::Regex;
use serde_json::Value;

/// 对象渲染为 `Title Case Key: value` 行，数组渲染为 `- item` 行；
/// 字符串若本身是 JSON 则先解析再渲染，否则折叠多余换行
pub fn format_result(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", title_case(&k.replace('_', " ")), inline_value(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", inline_value(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => format_result(&parsed),
            _ => format_text(s),
        },
        other => scalar(other),
    }
}

/// 连续换行折叠为一个并去掉首尾空白
pub fn format_text(text: &str) -> String {
    match Regex::new(r"[\n\r]+") {
        Ok(re) => re.replace_all(text, "\n").trim().to_string(),
        Err(_) => text.trim().to_string(),
    }
}

fn inline_value(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => scalar(other),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// 每段字母首字母大写，其余小写（数字、空格等视为分隔）
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
