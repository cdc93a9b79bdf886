//! Composio v3 REST client.
//!
//! All requests authenticate with the `x-api-key` header against
//! `{base_url}/api/v3/...`. Response bodies are read as loose JSON and
//! picked apart field by field, since list endpoints wrap results in
//! `{ "items": [...] }` and several fields have changed names between API
//! revisions (`redirect_url` / `redirect_uri`, `toolkit.slug` / `appName`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

use super::{ComposioApi, ConnectedAccount, ConnectionRequestHandle, ExecutionOutcome};
use crate::error::ServerError;
use crate::models::ToolDefinition;

pub const DEFAULT_BASE_URL: &str = "https://backend.composio.dev";

#[derive(Debug, Clone)]
pub struct ComposioConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ComposioConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct ComposioClient {
    client: reqwest::Client,
    config: ComposioConfig,
}

impl ComposioClient {
    pub fn new(config: ComposioConfig) -> Result<Self, ServerError> {
        if config.api_key.trim().is_empty() {
            return Err(ServerError::Unavailable(
                "Composio API key not configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/api/v3/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.client
            .request(method, url)
            .header("x-api-key", &self.config.api_key)
            .header("accept", "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, ServerError> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ServerError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ServerError::internal(format!("Failed to parse Composio response: {}", e)))
    }
}

#[async_trait]
impl ComposioApi for ComposioClient {
    async fn find_auth_config(&self, toolkit_slug: &str) -> Result<Option<String>, ServerError> {
        let json = self
            .send(
                self.request(Method::GET, "auth_configs")
                    .query(&[("toolkit_slug", toolkit_slug)]),
            )
            .await?;

        Ok(items(&json)
            .iter()
            .find(|config| {
                toolkit_of(config).is_some_and(|slug| slug.eq_ignore_ascii_case(toolkit_slug))
            })
            .and_then(|config| str_field(config, "id")))
    }

    async fn create_auth_config(&self, toolkit_slug: &str) -> Result<String, ServerError> {
        let body = serde_json::json!({
            "toolkit": { "slug": toolkit_slug },
            "auth_config": { "type": "use_composio_managed_auth" },
        });
        let json = self
            .send(self.request(Method::POST, "auth_configs").json(&body))
            .await?;

        json.get("auth_config")
            .and_then(|c| str_field(c, "id"))
            .or_else(|| str_field(&json, "id"))
            .ok_or_else(|| ServerError::internal("Composio did not return an auth config id"))
    }

    async fn initiate_connection(
        &self,
        user_id: &str,
        auth_config_id: &str,
    ) -> Result<ConnectionRequestHandle, ServerError> {
        let body = serde_json::json!({
            "auth_config": { "id": auth_config_id },
            "connection": { "user_id": user_id },
        });
        let json = self
            .send(self.request(Method::POST, "connected_accounts").json(&body))
            .await?;
        parse_connection_request(&json)
    }

    async fn get_connected_account(
        &self,
        connection_id: &str,
    ) -> Result<ConnectedAccount, ServerError> {
        let path = format!("connected_accounts/{}", urlencoding::encode(connection_id));
        let json = match self.send(self.request(Method::GET, &path)).await {
            Err(ServerError::Upstream { status: 404, .. }) => {
                return Err(ServerError::NotFound(format!(
                    "Connection {} not found",
                    connection_id
                )))
            }
            other => other?,
        };
        parse_connected_account(&json)
            .ok_or_else(|| ServerError::internal("Malformed connected account response"))
    }

    async fn list_connected_accounts(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectedAccount>, ServerError> {
        let json = self
            .send(
                self.request(Method::GET, "connected_accounts")
                    .query(&[("user_ids", user_id)]),
            )
            .await?;
        Ok(items(&json).iter().filter_map(parse_connected_account).collect())
    }

    async fn delete_connected_account(&self, connection_id: &str) -> Result<(), ServerError> {
        let path = format!("connected_accounts/{}", urlencoding::encode(connection_id));
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn list_tools(&self, toolkit_slug: &str) -> Result<Vec<ToolDefinition>, ServerError> {
        let json = self
            .send(
                self.request(Method::GET, "tools")
                    .query(&[("toolkit_slug", toolkit_slug), ("limit", "1000")]),
            )
            .await?;
        Ok(parse_tool_definitions(&json))
    }

    async fn get_toolkit(&self, toolkit_slug: &str) -> Result<Value, ServerError> {
        let path = format!("toolkits/{}", urlencoding::encode(toolkit_slug));
        self.send(self.request(Method::GET, &path)).await
    }

    async fn execute_tool(
        &self,
        tool_slug: &str,
        user_id: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<ExecutionOutcome, ServerError> {
        let path = format!("tools/execute/{}", urlencoding::encode(tool_slug));
        let body = serde_json::json!({ "user_id": user_id, "arguments": arguments });
        let json = self
            .send(self.request(Method::POST, &path).json(&body))
            .await?;

        Ok(ExecutionOutcome {
            successful: json
                .get("successful")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            error: str_field(&json, "error"),
            data: json.get("data").cloned().or(Some(json)),
        })
    }
}

// ─── Response parsing ────────────────────────────────────────────────────────

fn items(json: &Value) -> &[Value] {
    json.get("items")
        .and_then(Value::as_array)
        .or_else(|| json.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key).and_then(Value::as_str).map(str::to_string)
}

fn toolkit_of(json: &Value) -> Option<&str> {
    json.get("toolkit")
        .and_then(|t| t.get("slug"))
        .or_else(|| json.get("toolkit_slug"))
        .or_else(|| json.get("appName"))
        .and_then(Value::as_str)
}

fn timestamp(json: &Value, key: &str) -> Option<DateTime<Utc>> {
    json.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn parse_connection_request(json: &Value) -> Result<ConnectionRequestHandle, ServerError> {
    let id = str_field(json, "id")
        .ok_or_else(|| ServerError::internal("Composio did not return a connection id"))?;
    let redirect_url = str_field(json, "redirect_url")
        .or_else(|| str_field(json, "redirect_uri"))
        .or_else(|| {
            json.get("connectionData")
                .and_then(|d| d.get("val"))
                .and_then(|v| str_field(v, "redirectUrl"))
        })
        .ok_or_else(|| ServerError::internal("Composio did not return an authorization URL"))?;
    let status = str_field(json, "status").unwrap_or_else(|| "INITIATED".to_string());

    Ok(ConnectionRequestHandle {
        id,
        redirect_url,
        status,
    })
}

pub(crate) fn parse_connected_account(json: &Value) -> Option<ConnectedAccount> {
    Some(ConnectedAccount {
        id: str_field(json, "id")?,
        status: str_field(json, "status").unwrap_or_default(),
        toolkit_slug: toolkit_of(json).map(str::to_string),
        user_id: str_field(json, "user_id"),
        created_at: timestamp(json, "created_at"),
        updated_at: timestamp(json, "updated_at"),
    })
}

pub(crate) fn parse_tool_definitions(json: &Value) -> Vec<ToolDefinition> {
    items(json)
        .iter()
        .filter_map(|raw| {
            let slug = str_field(raw, "slug")?;
            let tool = ToolDefinition {
                name: str_field(raw, "name").unwrap_or_else(|| slug.clone()),
                description: str_field(raw, "description").unwrap_or_default(),
                input_parameters: raw.get("input_parameters").cloned().unwrap_or_default().into(),
                output_parameters: raw
                    .get("output_parameters")
                    .cloned()
                    .unwrap_or_default()
                    .into(),
                scopes: raw
                    .get("scopes")
                    .and_then(Value::as_array)
                    .map(|list| {
                        list.iter()
                            .filter_map(|s| s.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                no_auth: raw.get("no_auth").and_then(Value::as_bool).unwrap_or(false),
                version: str_field(raw, "version"),
                slug,
            };
            Some(tool)
        })
        .collect()
}
