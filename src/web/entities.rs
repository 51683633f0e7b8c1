//! Agent / Task / Crew / 输入 / 研究配置 的列表与增删改

use std::sync::Arc;

use axum::extract::State;
use axum::{Form, Json};
use serde_json::{json, Value};

use super::{ApiError, AppState, FormData};
use crate::crew::output_schema_catalog;
use crate::store::{AgentDef, CrewDef, ResearchConfig, TaskDef};

type Pairs = Form<Vec<(String, String)>>;

fn invalid_action(action: &str) -> ApiError {
    ApiError::bad_request(format!("Invalid action: {}", action))
}

fn agent_from_form(form: &FormData) -> AgentDef {
    AgentDef {
        name: form.text("name").trim().to_string(),
        role: form.text("role"),
        goal: form.text("goal"),
        backstory: form.text("backstory"),
        delegate: form.flag("delegate"),
        tools: form.get_all("tools"),
    }
}

fn task_from_form(form: &FormData) -> TaskDef {
    let schema = form
        .non_empty("output_schema")
        .or_else(|| form.non_empty("pydantic_class"))
        .filter(|s| *s != "None")
        .map(str::to_string);
    TaskDef {
        name: form.text("name").trim().to_string(),
        description: form.text("description"),
        expected_output: form.text("expected_output"),
        agent: form.text("agent").trim().to_string(),
        tools: form.get_all("tools"),
        output_schema: schema,
    }
}

fn crew_from_form(form: &FormData) -> CrewDef {
    CrewDef {
        name: form.text("name").trim().to_string(),
        agents: form.get_all("agents"),
        tasks: form.get_all("tasks"),
    }
}

fn research_config_from_form(form: &FormData) -> ResearchConfig {
    ResearchConfig {
        name: form.text("config_name").trim().to_string(),
        prompt_engineer_crew: form.text("prompt_engineer_crew"),
        research_crew: form.text("research_crew"),
        research_review_crew: form.text("research_review_crew"),
    }
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "agents": state.catalog.agents()?,
        "tools": state.catalog.available_tools(),
    })))
}

pub async fn update_agents(
    State(state): State<Arc<AppState>>,
    Form(pairs): Pairs,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let catalog = &state.catalog;
    let agents = match form.action()? {
        "add" => catalog.add_agent(agent_from_form(&form))?,
        "edit" => catalog.edit_agent(form.index()?, agent_from_form(&form))?,
        "delete" => catalog.delete_agent(form.index()?)?,
        other => return Err(invalid_action(other)),
    };
    Ok(Json(json!({ "agents": agents })))
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let agents: Vec<String> = state.catalog.agents()?.into_iter().map(|a| a.name).collect();
    Ok(Json(json!({
        "tasks": state.catalog.tasks()?,
        "agents": agents,
        "tools": state.catalog.available_tools(),
        "output_schemas": output_schema_catalog(),
    })))
}

pub async fn update_tasks(
    State(state): State<Arc<AppState>>,
    Form(pairs): Pairs,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let catalog = &state.catalog;
    let tasks = match form.action()? {
        "add" => catalog.add_task(task_from_form(&form))?,
        "edit" => catalog.edit_task(form.index()?, task_from_form(&form))?,
        "delete" => catalog.delete_task(form.index()?)?,
        other => return Err(invalid_action(other)),
    };
    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn list_crews(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let agents: Vec<String> = state.catalog.agents()?.into_iter().map(|a| a.name).collect();
    let tasks: Vec<String> = state.catalog.tasks()?.into_iter().map(|t| t.name).collect();
    Ok(Json(json!({
        "crews": state.catalog.crews()?,
        "agents": agents,
        "tasks": tasks,
    })))
}

pub async fn update_crews(
    State(state): State<Arc<AppState>>,
    Form(pairs): Pairs,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let catalog = &state.catalog;
    let crews = match form.action()? {
        "add" => catalog.add_crew(crew_from_form(&form))?,
        "edit" => catalog.edit_crew(form.index()?, crew_from_form(&form))?,
        "delete" => catalog.delete_crew(form.index()?)?,
        other => return Err(invalid_action(other)),
    };
    Ok(Json(json!({ "crews": crews })))
}

pub async fn list_inputs(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({ "inputs": state.catalog.inputs()? })))
}

pub async fn update_inputs(
    State(state): State<Arc<AppState>>,
    Form(pairs): Pairs,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let inputs = match form.action()? {
        "add" | "edit" => state
            .catalog
            .set_input(&form.text("name"), &form.text("value"))?,
        "delete" => state.catalog.delete_input(&form.text("name"))?,
        other => return Err(invalid_action(other)),
    };
    Ok(Json(json!({ "inputs": inputs })))
}

pub async fn list_research_configs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "configs": state.catalog.research_configs()?,
        "crews": state.catalog.crew_names(),
    })))
}

pub async fn update_research_configs(
    State(state): State<Arc<AppState>>,
    Form(pairs): Pairs,
) -> Result<Json<Value>, ApiError> {
    let form = FormData::from(pairs);
    let catalog = &state.catalog;
    let configs = match form.action()? {
        "add_config" => catalog.add_research_config(research_config_from_form(&form))?,
        "edit_config" => catalog.edit_research_config(research_config_from_form(&form))?,
        "delete_config" => catalog.delete_research_config(form.text("config_name").trim())?,
        other => return Err(invalid_action(other)),
    };
    Ok(Json(json!({ "configs": configs })))
}
