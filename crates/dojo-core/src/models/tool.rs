use serde::{Deserialize, Serialize};

use crate::schema::ToolSchema;

/// Raw tool definition with complete metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_parameters: ToolSchema,
    #[serde(default)]
    pub output_parameters: ToolSchema,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub no_auth: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// Body of `POST /tools/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRequest {
    pub tool_slug: String,
    pub user_id: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub tool_slug: String,
}

impl ToolExecutionResponse {
    pub fn failed(tool_slug: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            tool_slug: tool_slug.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_tolerates_missing_and_malformed_schemas() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "Send email",
            "slug": "GMAIL_SEND_EMAIL",
            "input_parameters": "not-a-schema",
        }))
        .unwrap();
        assert!(def.input_parameters.is_empty());
        assert!(def.output_parameters.is_empty());
        assert!(!def.no_auth);
        assert!(def.scopes.is_empty());
    }
}
