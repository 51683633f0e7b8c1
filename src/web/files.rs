//! 结果下载与维护（临时文件、日志、缓存）

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};

use super::{ApiError, AppState, FormData};
use crate::cache::DB_FILE_NAME;
use crate::format::{json_to_xlsx, resolve_temp_file};
use crate::observability::LOG_FILE_NAME;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn attachment(body: Vec<u8>, mime: &str, ext: &str) -> Response {
    let name = format!(
        "research_results_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        ext
    );
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", name)),
        ],
        body,
    )
        .into_response()
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ApiError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::internal(format!("Error reading {}: {}", path.display(), e)))
}

/// GET /download_json/:filename
pub async fn download_json(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    let path = resolve_temp_file(&state.temp_dir, &filename, "json")?;
    if !path.is_file() {
        return Err(ApiError::not_found("File not found"));
    }
    tracing::info!(file = %path.display(), "sending json");
    Ok(attachment(read_file(&path).await?, "application/json", "json"))
}

/// GET /download_excel/:filename：从同名 JSON 生成 xlsx 后下载
pub async fn download_excel(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    let json_path = resolve_temp_file(&state.temp_dir, &filename, "json")?;
    if !json_path.is_file() {
        return Err(ApiError::not_found("Source file not found"));
    }
    let xlsx_path = resolve_temp_file(&state.temp_dir, &filename, "xlsx")?;
    let target = xlsx_path.clone();
    tokio::task::spawn_blocking(move || json_to_xlsx(&json_path, &target))
        .await
        .map_err(|e| ApiError::internal(format!("Excel export task failed: {}", e)))??;
    Ok(attachment(read_file(&xlsx_path).await?, XLSX_MIME, "xlsx"))
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub date: String,
    pub size: u64,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'))
}

/// dir 下匹配 pattern 的非隐藏文件，按修改时间倒序
fn list_files(dir: &Path, pattern: &str) -> Vec<FileInfo> {
    let full = dir.join(pattern);
    let Ok(paths) = glob::glob(&full.to_string_lossy()) else {
        tracing::error!(pattern = %full.display(), "invalid glob pattern");
        return Vec::new();
    };
    let mut files: Vec<FileInfo> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && !is_hidden(p))
        .filter_map(|p| {
            let meta = std::fs::metadata(&p)
                .map_err(|e| tracing::error!(file = %p.display(), error = %e, "cannot stat file"))
                .ok()?;
            let modified: DateTime<Local> = meta.modified().ok()?.into();
            Some(FileInfo {
                name: p.file_name()?.to_string_lossy().into_owned(),
                date: modified.format("%Y-%m-%d %H:%M:%S").to_string(),
                size: meta.len(),
            })
        })
        .collect();
    files.sort_by(|a, b| b.date.cmp(&a.date));
    files
}

/// 删除 dir 下匹配 pattern 且 keep 返回 false 的文件，返回删除数
fn remove_files(dir: &Path, pattern: &str, keep: impl Fn(&str) -> bool) -> usize {
    let full = dir.join(pattern);
    let Ok(paths) = glob::glob(&full.to_string_lossy()) else {
        return 0;
    };
    let targets: Vec<PathBuf> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && !is_hidden(p))
        .filter(|p| !p.file_name().and_then(|n| n.to_str()).map_or(true, &keep))
        .collect();
    let mut removed = 0;
    for path in targets {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::error!(file = %path.display(), error = %e, "error deleting file"),
        }
    }
    removed
}

/// GET /maintenance
pub async fn maintenance_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let cached = state.cache.entries().map_err(|e| {
        ApiError::internal(format!("Error reading cached results: {}", e))
    })?;
    Ok(Json(json!({
        "temp_files": list_files(&state.temp_dir, "*"),
        "log_files": list_files(&state.log_dir, "*.log"),
        "cached_results": cached,
        "cache_files": list_files(&state.cache_dir, "*"),
    })))
}

/// POST /maintenance：action = clear_temp | clear_logs | clear_cache_dbs
pub async fn maintenance_action(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let action = form.action()?;
    tracing::info!(action, "maintenance");
    let body = match action {
        "clear_temp" => {
            let removed = remove_files(&state.temp_dir, "*", |_| false);
            json!({ "message": "Temporary files cleared successfully", "removed": removed })
        }
        "clear_logs" => {
            let removed = remove_files(&state.log_dir, "*.log", |name| name == LOG_FILE_NAME);
            json!({ "message": "Log files cleared successfully", "removed": removed })
        }
        "clear_cache_dbs" => {
            // 打开中的数据库文件只清空内容，不删除
            let entries = state
                .cache
                .clear()
                .map_err(|e| ApiError::internal(format!("Error clearing cache: {}", e)))?;
            let removed = remove_files(&state.cache_dir, "*", |name| name.starts_with(DB_FILE_NAME));
            let message = if entries + removed > 0 {
                "Cache files cleared successfully"
            } else {
                "No cache files to clear"
            };
            json!({ "message": message, "removed": removed, "cleared_entries": entries })
        }
        other => return Err(ApiError::bad_request(format!("Invalid action: {}", other))),
    };
    Ok(Json(body))
}
