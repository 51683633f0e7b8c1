//! 执行接口：直接执行 Crew / 运行自评估研究流程

use std::sync::Arc;

use axum::extract::State;
use axum::{Form, Json};
use serde_json::{json, Value};

use super::{ApiError, AppState, FormData};
use crate::flow::ResearchService;
use crate::format::{format_result, save_result_json};

/// POST /execute_crew：表单字段 crew_name
pub async fn execute_crew(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let crew_name = form
        .non_empty("crew_name")
        .ok_or_else(|| ApiError::bad_request("No crew name provided"))?;
    tracing::info!(crew = crew_name, "executing crew");

    let output = state
        .catalog
        .execute_crew(crew_name)
        .await
        .map_err(|e| ApiError::internal(format!("Error executing crew: {}", e)))?;
    let result = output.result_value();
    let formatted = format_result(&result);

    let filename = match save_result_json(&state.temp_dir, "crew", &result) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::error!(error = %e, "error saving crew results");
            None
        }
    };
    Ok(Json(json!({
        "result": result,
        "formatted_result": formatted,
        "filename": filename,
    })))
}

/// POST /execute_self_eval_crew：表单字段 prompt 与 crew_name（研究配置名）
pub async fn execute_self_eval_crew(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let (Some(prompt), Some(config_name)) = (form.non_empty("prompt"), form.non_empty("crew_name"))
    else {
        return Err(ApiError::bad_request("Missing prompt or crew name"));
    };
    tracing::info!(config = config_name, "executing self-evaluating crew");

    let service = ResearchService::new(state.catalog.clone(), config_name, state.flow.clone())
        .map_err(|e| ApiError::internal(format!("Error executing self-evaluating crew: {}", e)))?;
    let run = service.run(prompt).await;
    let result = run.outcome.result;

    let filename = save_result_json(&state.temp_dir, "self_eval", &Value::String(result.clone()))
        .map_err(|e| {
            tracing::error!(error = %e, "error saving research results");
            ApiError::internal("Error saving results")
        })?;
    Ok(Json(json!({
        "result": result,
        "formatted_result": run.formatted,
        "filename": filename,
        "status": run.outcome.status,
        "run_id": run.run_id,
    })))
}
