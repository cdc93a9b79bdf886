//! Composio platform access.
//!
//! [`ComposioApi`] is the seam between the integration manager and the
//! Composio v3 REST API. [`ComposioClient`] is the production implementation;
//! tests substitute an in-process fake.

pub mod client;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::models::ToolDefinition;

pub use client::{ComposioClient, ComposioConfig};

/// A pending OAuth request created for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequestHandle {
    pub id: String,
    pub redirect_url: String,
    pub status: String,
}

/// Connected account as reported by Composio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub toolkit_slug: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Raw outcome of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub successful: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait ComposioApi: Send + Sync {
    /// Id of an existing auth config for the toolkit, if any.
    async fn find_auth_config(&self, toolkit_slug: &str) -> Result<Option<String>, ServerError>;

    /// Create a Composio-managed auth config and return its id.
    async fn create_auth_config(&self, toolkit_slug: &str) -> Result<String, ServerError>;

    async fn initiate_connection(
        &self,
        user_id: &str,
        auth_config_id: &str,
    ) -> Result<ConnectionRequestHandle, ServerError>;

    async fn get_connected_account(&self, connection_id: &str)
        -> Result<ConnectedAccount, ServerError>;

    async fn list_connected_accounts(&self, user_id: &str)
        -> Result<Vec<ConnectedAccount>, ServerError>;

    async fn delete_connected_account(&self, connection_id: &str) -> Result<(), ServerError>;

    async fn list_tools(&self, toolkit_slug: &str) -> Result<Vec<ToolDefinition>, ServerError>;

    async fn get_toolkit(&self, toolkit_slug: &str) -> Result<serde_json::Value, ServerError>;

    async fn execute_tool(
        &self,
        tool_slug: &str,
        user_id: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionOutcome, ServerError>;
}
