//! HTTP 接口：配置管理、执行、下载、维护
//!
//! POST 请求体为表单编码（多值字段如 tools 可重复出现），响应统一为 JSON。

pub mod entities;
pub mod error;
pub mod execute;
pub mod files;
pub mod form;
pub mod state;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub use error::ApiError;
pub use form::FormData;
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/", get(overview))
        .route("/agents", get(entities::list_agents).post(entities::update_agents))
        .route("/manage_agents", get(entities::list_agents).post(entities::update_agents))
        .route("/tasks", get(entities::list_tasks).post(entities::update_tasks))
        .route("/manage_tasks", get(entities::list_tasks).post(entities::update_tasks))
        .route("/crews", get(entities::list_crews).post(entities::update_crews))
        .route("/manage_crews", get(entities::list_crews).post(entities::update_crews))
        .route("/manage_inputs", get(entities::list_inputs).post(entities::update_inputs))
        .route(
            "/research_config",
            get(entities::list_research_configs).post(entities::update_research_configs),
        )
        .route("/execute_crew", post(execute::execute_crew))
        .route("/execute_self_eval_crew", post(execute::execute_self_eval_crew))
        .route("/download_json/:filename", get(files::download_json))
        .route("/download_excel/:filename", get(files::download_excel))
        .route("/maintenance", get(files::maintenance_status).post(files::maintenance_action))
        .with_state(state)
}

/// GET /：可执行的 Crew 与研究配置名
async fn overview(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let configs: Vec<String> = state
        .catalog
        .research_configs()?
        .into_iter()
        .map(|c| c.name)
        .collect();
    Ok(Json(json!({
        "crews": state.catalog.crew_names(),
        "research_configs": configs,
    })))
}
