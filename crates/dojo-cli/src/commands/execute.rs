//! `dojo execute` - Run a tool on behalf of a user.

use dojo_core::models::ToolExecutionRequest;
use dojo_core::remote::DojoClient;

use super::print_data;

/// Parse `--params`; the value must be a JSON object.
pub fn parse_params(params: &str) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    match serde_json::from_str(params) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err("--params must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid --params JSON: {}", e)),
    }
}

pub async fn run(client: &DojoClient, tool: &str, user_id: &str, params: &str) -> Result<(), String> {
    let request = ToolExecutionRequest {
        tool_slug: tool.to_string(),
        user_id: user_id.to_string(),
        parameters: parse_params(params)?,
    };
    let response = client
        .execute_tool(&request)
        .await
        .map_err(|e| e.to_string())?;
    print_data(&response)?;

    if response.success {
        Ok(())
    } else {
        Err(format!(
            "Tool {} failed: {}",
            response.tool_slug,
            response.error.as_deref().unwrap_or("unknown error")
        ))
    }
}
