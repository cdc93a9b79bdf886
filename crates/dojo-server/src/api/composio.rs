use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::ServerError;
use crate::models::{
    ApiResponse, ConnectionInfo, ConnectionInitiateResponse, ConnectionRequest,
    ConnectionStatusResponse, ToolDefinition, ToolExecutionRequest, ToolExecutionResponse,
    ToolkitInfo,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/toolkits", get(list_toolkits))
        .route("/toolkits/{slug}/tools", get(toolkit_tools))
        .route("/toolkits/{slug}/metadata", get(toolkit_metadata))
        .route("/connections/initiate", post(initiate_connection))
        .route("/connections/{id}/status", get(connection_status))
        .route("/connections/{id}", axum::routing::delete(disconnect))
        .route("/users/{user_id}/connections", get(user_connections))
        .route("/tools/execute", post(execute_tool))
}

#[derive(Debug, Deserialize)]
struct ToolkitQuery {
    search: Option<String>,
    category: Option<String>,
}

async fn list_toolkits(
    State(state): State<AppState>,
    Query(query): Query<ToolkitQuery>,
) -> Result<Json<ApiResponse<Vec<ToolkitInfo>>>, ServerError> {
    let toolkits = state
        .integrations()?
        .list_toolkits(query.search.as_deref(), query.category.as_deref());
    let message = format!("Found {} toolkits", toolkits.len());
    Ok(Json(ApiResponse::ok(toolkits, message)))
}

async fn toolkit_tools(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Vec<ToolDefinition>>>, ServerError> {
    let tools = state.integrations()?.toolkit_tools(&slug).await?;
    let message = format!("Retrieved {} tools for {}", tools.len(), slug);
    Ok(Json(ApiResponse::ok(tools, message)))
}

async fn toolkit_metadata(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServerError> {
    let metadata = state.integrations()?.toolkit_metadata(&slug).await?;
    Ok(Json(ApiResponse::ok(
        metadata,
        format!("Retrieved metadata for {}", slug),
    )))
}

async fn initiate_connection(
    State(state): State<AppState>,
    body: Result<Json<ConnectionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ConnectionInitiateResponse>>, ServerError> {
    let Json(body) = body?;
    let response = state
        .integrations()?
        .initiate_connection(&body.toolkit_slug, &body.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(
        response,
        "Connection initiated successfully",
    )))
}

async fn connection_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ConnectionStatusResponse>>, ServerError> {
    let status = state.integrations()?.check_status(&id).await?;
    Ok(Json(ApiResponse::ok(status, "Connection status retrieved")))
}

async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServerError> {
    state.integrations()?.disconnect(&id).await?;
    Ok(Json(ApiResponse::ok(
        serde_json::json!({ "connection_id": id }),
        "Connection disconnected successfully",
    )))
}

async fn user_connections(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ConnectionInfo>>>, ServerError> {
    let connections = state.integrations()?.user_connections(&user_id).await?;
    let message = format!("Found {} active connections", connections.len());
    Ok(Json(ApiResponse::ok(connections, message)))
}

async fn execute_tool(
    State(state): State<AppState>,
    body: Result<Json<ToolExecutionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ToolExecutionResponse>>, ServerError> {
    let Json(body) = body?;
    let response = state.integrations()?.execute_tool(body).await?;
    let message = if response.success {
        format!("Tool {} executed successfully", response.tool_slug)
    } else {
        format!("Tool {} execution failed", response.tool_slug)
    };
    Ok(Json(ApiResponse::with_success(
        response.success,
        response,
        message,
    )))
}
