//! HTTP client for a running Dojo server.
//!
//! Talks to the `/api/v1/composio` routes and unwraps the
//! `{ success, data, message }` envelope. Error bodies (`{ error, message }`)
//! are mapped back onto [`ServerError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ServerError;
use crate::models::{
    ConnectionInfo, ConnectionInitiateResponse, ConnectionRequest, ConnectionStatusResponse,
    ToolDefinition, ToolExecutionRequest, ToolExecutionResponse, ToolkitInfo,
};
use crate::oauth::ConnectionApi;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

pub struct DojoClient {
    client: reqwest::Client,
    base_url: String,
}

impl DojoClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServerError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api/v1/composio{}", self.base_url, path))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ServerError> {
        let response = builder.send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            let code = body.get("error").and_then(Value::as_str).unwrap_or("UNKNOWN");
            return Err(match status.as_u16() {
                404 => ServerError::NotFound(message),
                503 => ServerError::Unavailable(message),
                other => ServerError::Upstream {
                    status: other,
                    body: format!("{}: {}", code, message),
                },
            });
        }

        let data = body.get("data").cloned().unwrap_or(Value::Null);
        serde_json::from_value(data)
            .map_err(|e| ServerError::internal(format!("Unexpected response from server: {}", e)))
    }

    pub async fn health(&self) -> Result<Value, ServerError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(response.json().await?)
    }

    pub async fn list_toolkits(
        &self,
        search: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<ToolkitInfo>, ServerError> {
        let mut query = Vec::new();
        if let Some(search) = search {
            query.push(("search", search));
        }
        if let Some(category) = category {
            query.push(("category", category));
        }
        self.send(self.request(Method::GET, "/toolkits").query(&query))
            .await
    }

    pub async fn toolkit_tools(&self, toolkit_slug: &str) -> Result<Vec<ToolDefinition>, ServerError> {
        let path = format!("/toolkits/{}/tools", urlencoding::encode(toolkit_slug));
        self.send(self.request(Method::GET, &path)).await
    }

    pub async fn toolkit_metadata(&self, toolkit_slug: &str) -> Result<Value, ServerError> {
        let path = format!("/toolkits/{}/metadata", urlencoding::encode(toolkit_slug));
        self.send(self.request(Method::GET, &path)).await
    }

    pub async fn initiate_connection(
        &self,
        toolkit_slug: &str,
        user_id: &str,
    ) -> Result<ConnectionInitiateResponse, ServerError> {
        let body = ConnectionRequest {
            toolkit_slug: toolkit_slug.to_string(),
            user_id: user_id.to_string(),
        };
        self.send(self.request(Method::POST, "/connections/initiate").json(&body))
            .await
    }

    pub async fn connection_status(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionStatusResponse, ServerError> {
        let path = format!("/connections/{}/status", urlencoding::encode(connection_id));
        self.send(self.request(Method::GET, &path)).await
    }

    pub async fn user_connections(&self, user_id: &str) -> Result<Vec<ConnectionInfo>, ServerError> {
        let path = format!("/users/{}/connections", urlencoding::encode(user_id));
        self.send(self.request(Method::GET, &path)).await
    }

    pub async fn disconnect(&self, connection_id: &str) -> Result<Value, ServerError> {
        let path = format!("/connections/{}", urlencoding::encode(connection_id));
        self.send(self.request(Method::DELETE, &path)).await
    }

    pub async fn execute_tool(
        &self,
        request: &ToolExecutionRequest,
    ) -> Result<ToolExecutionResponse, ServerError> {
        self.send(self.request(Method::POST, "/tools/execute").json(request))
            .await
    }
}

#[async_trait]
impl ConnectionApi for DojoClient {
    async fn initiate(
        &self,
        toolkit_slug: &str,
        user_id: &str,
    ) -> Result<ConnectionInitiateResponse, ServerError> {
        self.initiate_connection(toolkit_slug, user_id).await
    }

    async fn status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ServerError> {
        self.connection_status(connection_id).await
    }
}
