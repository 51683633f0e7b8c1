//! 表单字段访问：保留重复键，供多选字段（tools / agents / tasks）使用

use super::ApiError;

#[derive(Debug, Default, Clone)]
pub struct FormData(Vec<(String, String)>);

impl From<Vec<(String, String)>> for FormData {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl FormData {
    /// 首个同名字段
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 去空白后非空的字段
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn text(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// 所有同名字段的非空值；同时接受 `tools[]` 写法
    pub fn get_all(&self, key: &str) -> Vec<String> {
        let bracket = format!("{}[]", key);
        self.0
            .iter()
            .filter(|(k, _)| k == key || *k == bracket)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("True" | "true" | "on" | "1"))
    }

    pub fn action(&self) -> Result<&str, ApiError> {
        self.non_empty("action")
            .ok_or_else(|| ApiError::bad_request("action is required"))
    }

    pub fn index(&self) -> Result<usize, ApiError> {
        let raw = self
            .non_empty("index")
            .ok_or_else(|| ApiError::bad_request("index is required"))?;
        raw.parse()
            .map_err(|_| ApiError::bad_request(format!("invalid index: {}", raw)))
    }
}
