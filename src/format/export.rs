//! 结果落盘与 Excel 导出
//!
//! 执行结果以 `{"result": ...}` 写入 `{temp}/{prefix}_{millis}_{suffix}.json`（suffix 为 8 位随机十六进制），下载时按文件名（不含扩展名）取回。
//! Excel 导出从 result 文本中截取最外层 `{...}`，展开为透视行；解析失败时退化为单行表。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Workbook, XlsxError};
use serde_json::{Map, Value};

use crate::core::AppError;

/// 一行透视数据：列名与单元格值，保持插入顺序
pub type Row = Vec<(String, Value)>;

/// Excel 单元格文本上限
const MAX_CELL_CHARS: usize = 32_767;

fn io_err(path: &Path, e: std::io::Error) -> AppError {
    AppError::Export(format!("{}: {}", path.display(), e))
}

/// 写入 `{"result": result}`，返回不含扩展名的文件名
pub fn save_result_json(temp_dir: &Path, prefix: &str, result: &Value) -> Result<String, AppError> {
    std::fs::create_dir_all(temp_dir).map_err(|e| io_err(temp_dir, e))?;
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let filename = format!(
        "{}_{}_{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8]
    );
    let path = temp_dir.join(format!("{}.json", filename));
    let body = serde_json::to_string_pretty(&serde_json::json!({ "result": result }))
        .map_err(|e| AppError::Export(e.to_string()))?;
    std::fs::write(&path, body).map_err(|e| io_err(&path, e))?;
    tracing::info!(file = %path.display(), "saved result");
    Ok(filename)
}

/// 只取 basename，拼上扩展名后定位到 temp 目录下
pub fn resolve_temp_file(temp_dir: &Path, filename: &str, ext: &str) -> Result<PathBuf, AppError> {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "..")
        .ok_or_else(|| AppError::InvalidRequest(format!("invalid file name: {}", filename)))?;
    Ok(temp_dir.join(format!("{}.{}", base, ext)))
}

/// 递归展开嵌套对象：
/// 标量产生一行 `{父键.. = 值, 键 = 值}`；数组中的对象继续展开，标量元素各自成行
pub fn flatten_rows(data: &Map<String, Value>) -> Vec<Row> {
    let mut rows = Vec::new();
    unpack(data, &[], &mut rows);
    rows
}

fn leaf_row(parents: &[String], key: &str, value: &Value) -> Row {
    let mut row: Row = Vec::with_capacity(parents.len() + 1);
    for parent in parents {
        set_cell(&mut row, parent, value);
    }
    set_cell(&mut row, key, value);
    row
}

fn set_cell(row: &mut Row, key: &str, value: &Value) {
    match row.iter_mut().find(|(k, _)| k == key) {
        Some(cell) => cell.1 = value.clone(),
        None => row.push((key.to_string(), value.clone())),
    }
}

fn unpack(data: &Map<String, Value>, parents: &[String], rows: &mut Vec<Row>) {
    for (key, value) in data {
        let mut nested = parents.to_vec();
        nested.push(key.clone());
        match value {
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Object(obj) => unpack(obj, &nested, rows),
                        other => rows.push(leaf_row(parents, key, other)),
                    }
                }
            }
            Value::Object(obj) => unpack(obj, &nested, rows),
            other => rows.push(leaf_row(parents, key, other)),
        }
    }
}

/// 从 result 文本截取首个 '{' 到最后一个 '}' 并解析为对象
fn outer_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// 把已保存的结果 JSON 转为 xlsx
pub fn json_to_xlsx(json_path: &Path, xlsx_path: &Path) -> Result<(), AppError> {
    let content = std::fs::read_to_string(json_path).map_err(|e| io_err(json_path, e))?;
    let doc: Value = serde_json::from_str(&content)
        .map_err(|e| AppError::Export(format!("{}: {}", json_path.display(), e)))?;

    let parsed = match doc.get("result") {
        Some(Value::String(s)) => outer_object(s),
        Some(Value::Object(map)) => Some(map.clone()),
        _ => None,
    };
    let rows = match parsed {
        Some(map) => flatten_rows(&map),
        None => {
            tracing::warn!(file = %json_path.display(), "result is not JSON, exporting single row");
            let row: Row = match doc {
                Value::Object(map) => map.into_iter().collect(),
                other => vec![("result".to_string(), other)],
            };
            vec![row]
        }
    };
    write_rows(&rows, xlsx_path).map_err(|e| AppError::Export(e.to_string()))?;
    tracing::info!(file = %xlsx_path.display(), rows = rows.len(), "exported excel");
    Ok(())
}

fn columns(rows: &[Row]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut cols = Vec::new();
    for (key, _) in rows.iter().flatten() {
        if seen.insert(key.clone()) {
            cols.push(key.clone());
        }
    }
    cols
}

fn write_rows(rows: &[Row], path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let cols = columns(rows);
    for (c, name) in cols.iter().enumerate() {
        sheet.write_string(0, c as u16, name.as_str())?;
    }
    for (r, row) in rows.iter().enumerate() {
        let excel_row = (r + 1) as u32;
        for (key, value) in row {
            let Some(c) = cols.iter().position(|k| k == key) else {
                continue;
            };
            let c = c as u16;
            match value {
                Value::Number(n) => match n.as_f64() {
                    Some(f) => sheet.write_number(excel_row, c, f)?,
                    None => sheet.write_string(excel_row, c, n.to_string())?,
                },
                Value::Bool(b) => sheet.write_boolean(excel_row, c, *b)?,
                Value::Null => continue,
                Value::String(s) => sheet.write_string(excel_row, c, clip(s))?,
                other => sheet.write_string(excel_row, c, clip(&other.to_string()))?,
            };
        }
    }
    workbook.save(path)?;
    Ok(())
}

fn clip(s: &str) -> String {
    s.chars().take(MAX_CELL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_flatten_nested() {
        let data = obj(json!({
            "country": "Thailand",
            "cities": [{"name": "Bangkok"}, {"name": "Chiang Mai"}],
            "tags": ["asia", "sea"]
        }));
        let rows = flatten_rows(&data);
        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows[0],
            vec![
                ("cities".to_string(), json!("Bangkok")),
                ("name".to_string(), json!("Bangkok"))
            ]
        );
        assert_eq!(rows[2], vec![("country".to_string(), json!("Thailand"))]);
        assert_eq!(rows[3], vec![("tags".to_string(), json!("asia"))]);
    }

    #[test]
    fn test_resolve_strips_directories() {
        let dir = Path::new("/tmp/t");
        let p = resolve_temp_file(dir, "../../etc/passwd", "json").unwrap();
        assert_eq!(p, dir.join("passwd.json"));
        assert!(resolve_temp_file(dir, "..", "json").is_err());
        assert!(resolve_temp_file(dir, "", "json").is_err());
    }

    #[test]
    fn test_save_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let name = save_result_json(
            dir.path(),
            "crew",
            &json!("Here you go: {\"city\": \"Bangkok\", \"facts\": [{\"pop\": 8}]} done"),
        )
        .unwrap();
        assert!(name.starts_with("crew_"));

        let json_path = resolve_temp_file(dir.path(), &name, "json").unwrap();
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert!(saved["result"].as_str().unwrap().contains("Bangkok"));

        let xlsx = resolve_temp_file(dir.path(), &name, "xlsx").unwrap();
        json_to_xlsx(&json_path, &xlsx).unwrap();
        assert!(std::fs::metadata(&xlsx).unwrap().len() > 0);
    }

    #[test]
    fn test_saves_in_same_millisecond_keep_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let names: BTreeSet<String> = (0..50)
            .map(|i| save_result_json(dir.path(), "crew", &json!(i)).unwrap())
            .collect();
        assert_eq!(names.len(), 50);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 50);
    }

    #[test]
    fn test_export_falls_back_to_single_row() {
        let dir = tempfile::tempdir().unwrap();
        let name = save_result_json(dir.path(), "self_eval", &json!("plain text answer")).unwrap();
        let json_path = resolve_temp_file(dir.path(), &name, "json").unwrap();
        let xlsx = resolve_temp_file(dir.path(), &name, "xlsx").unwrap();
        json_to_xlsx(&json_path, &xlsx).unwrap();
        assert!(xlsx.exists());
    }
}
