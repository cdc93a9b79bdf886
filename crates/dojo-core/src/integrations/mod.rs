//! Integration manager - the backend side of toolkit connections.
//!
//! Wraps a [`ComposioApi`] with input validation, status mapping and the
//! local [`ConnectionStore`]. Every HTTP route and the in-process connection
//! flow go through this type.

use std::sync::Arc;

use chrono::Utc;

use crate::composio::{ComposioApi, ConnectedAccount, ConnectionRequestHandle};
use crate::error::ServerError;
use crate::models::{
    AppType, Connection, ConnectionInfo, ConnectionInitiateResponse, ConnectionStatus,
    ConnectionStatusResponse, ToolDefinition, ToolExecutionRequest, ToolExecutionResponse,
    ToolkitInfo,
};
use crate::store::ConnectionStore;

pub struct IntegrationManager {
    composio: Arc<dyn ComposioApi>,
    store: ConnectionStore,
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ServerError> {
    if value.trim().is_empty() {
        return Err(ServerError::BadRequest {
            code: "VALIDATION_ERROR",
            message: format!("{} must not be empty", field),
        });
    }
    Ok(())
}

impl IntegrationManager {
    pub fn new(composio: Arc<dyn ComposioApi>, store: ConnectionStore) -> Self {
        Self { composio, store }
    }

    pub fn store(&self) -> &ConnectionStore {
        &self.store
    }

    /// Supported toolkits, optionally filtered by a case-insensitive search
    /// query and an exact category.
    pub fn list_toolkits(&self, search: Option<&str>, category: Option<&str>) -> Vec<ToolkitInfo> {
        AppType::ALL
            .iter()
            .map(AppType::toolkit_info)
            .filter(|t| search.map_or(true, |q| t.matches_search(q)))
            .filter(|t| category.map_or(true, |c| t.categories.iter().any(|tc| tc == c)))
            .collect()
    }

    /// Start an OAuth flow for `user_id` on `toolkit_slug`.
    ///
    /// Every call creates a new pending connection upstream; earlier pending
    /// attempts for the same user and toolkit are left untouched.
    pub async fn initiate_connection(
        &self,
        toolkit_slug: &str,
        user_id: &str,
    ) -> Result<ConnectionInitiateResponse, ServerError> {
        require_non_empty(toolkit_slug, "toolkit_slug")?;
        require_non_empty(user_id, "user_id")?;

        let app = AppType::from_slug(toolkit_slug).ok_or_else(|| ServerError::BadRequest {
            code: "INVALID_TOOLKIT",
            message: format!("Toolkit '{}' is not supported", toolkit_slug),
        })?;

        let result = self
            .request_connection(app, user_id)
            .await
            .map_err(|e| {
                e.during(
                    "CONNECTION_INITIATION_FAILED",
                    &format!("Failed to initiate connection for {}", app.slug()),
                )
            })?;

        let connection = Connection::pending(
            result.id.clone(),
            app.slug().to_string(),
            user_id.to_string(),
        );
        self.store.insert(&connection).await?;

        tracing::info!(
            "Initiated {} connection {} for user {}",
            app.slug(),
            connection.connection_id,
            user_id
        );

        Ok(ConnectionInitiateResponse {
            connection_id: result.id,
            auth_url: result.redirect_url,
            toolkit_slug: app.slug().to_string(),
            status: ConnectionStatus::Pending,
        })
    }

    async fn request_connection(
        &self,
        app: AppType,
        user_id: &str,
    ) -> Result<ConnectionRequestHandle, ServerError> {
        let auth_config_id = match self.composio.find_auth_config(app.slug()).await? {
            Some(id) => id,
            None => {
                tracing::info!("Creating Composio-managed auth config for {}", app.slug());
                self.composio.create_auth_config(app.slug()).await?
            }
        };
        self.composio.initiate_connection(user_id, &auth_config_id).await
    }

    /// Current status of a connection, as seen by Composio.
    pub async fn check_status(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionStatusResponse, ServerError> {
        require_non_empty(connection_id, "connection_id")?;

        let account = self
            .composio
            .get_connected_account(connection_id)
            .await
            .map_err(|e| e.during("STATUS_CHECK_FAILED", "Failed to check connection status"))?;

        let status = ConnectionStatus::from_upstream(&account.status);
        self.record(&account, status).await?;

        Ok(ConnectionStatusResponse {
            connection_id: connection_id.to_string(),
            status,
            message: (!account.status.is_empty()).then(|| account.status.to_lowercase()),
        })
    }

    async fn record(&self, account: &ConnectedAccount, status: ConnectionStatus) -> Result<(), ServerError> {
        if self.store.update_status(&account.id, status).await? {
            return Ok(());
        }
        if self.store.get(&account.id).await?.is_some() {
            return Ok(());
        }
        // Seen upstream but never initiated here (e.g. connected from another client).
        let now = Utc::now();
        self.store
            .upsert(&Connection {
                connection_id: account.id.clone(),
                app_type: account.toolkit_slug.clone().unwrap_or_else(|| "unknown".into()),
                user_id: account.user_id.clone().unwrap_or_default(),
                status,
                created_at: account.created_at.unwrap_or(now),
                updated_at: account.updated_at.unwrap_or(now),
            })
            .await
    }

    /// Active connections for a user.
    pub async fn user_connections(&self, user_id: &str) -> Result<Vec<ConnectionInfo>, ServerError> {
        require_non_empty(user_id, "user_id")?;

        let accounts = self
            .composio
            .list_connected_accounts(user_id)
            .await
            .map_err(|e| {
                e.during(
                    "CONNECTION_LIST_FAILED",
                    "Failed to list connections for user",
                )
            })?;

        let mut active = Vec::new();
        for mut account in accounts {
            let status = ConnectionStatus::from_upstream(&account.status);
            if status != ConnectionStatus::Active {
                continue;
            }
            if account.user_id.is_none() {
                account.user_id = Some(user_id.to_string());
            }
            self.record(&account, status).await?;
            active.push(ConnectionInfo {
                connection_id: account.id,
                app_type: account.toolkit_slug.unwrap_or_else(|| "unknown".to_string()),
                status,
                created_at: account.created_at,
                updated_at: account.updated_at,
            });
        }
        Ok(active)
    }

    /// Remove a connection upstream and locally.
    pub async fn disconnect(&self, connection_id: &str) -> Result<(), ServerError> {
        require_non_empty(connection_id, "connection_id")?;

        self.composio
            .delete_connected_account(connection_id)
            .await
            .map_err(|e| e.during("DISCONNECT_FAILED", "Failed to disconnect app"))?;

        if !self.store.delete(connection_id).await? {
            tracing::debug!("Disconnected {} which was not tracked locally", connection_id);
        }
        tracing::info!("Disconnected connection {}", connection_id);
        Ok(())
    }

    pub async fn toolkit_tools(&self, toolkit_slug: &str) -> Result<Vec<ToolDefinition>, ServerError> {
        require_non_empty(toolkit_slug, "toolkit_slug")?;
        self.composio.list_tools(toolkit_slug).await.map_err(|e| {
            e.during(
                "TOOL_DEFINITIONS_FAILED",
                &format!("Failed to get tool definitions for {}", toolkit_slug),
            )
        })
    }

    /// A single tool definition by slug (case-insensitive).
    pub async fn tool_definition(
        &self,
        toolkit_slug: &str,
        tool_slug: &str,
    ) -> Result<ToolDefinition, ServerError> {
        self.toolkit_tools(toolkit_slug)
            .await?
            .into_iter()
            .find(|t| t.slug.eq_ignore_ascii_case(tool_slug))
            .ok_or_else(|| {
                ServerError::NotFound(format!("Tool {} not found in {}", tool_slug, toolkit_slug))
            })
    }

    pub async fn toolkit_metadata(&self, toolkit_slug: &str) -> Result<serde_json::Value, ServerError> {
        require_non_empty(toolkit_slug, "toolkit_slug")?;
        self.composio.get_toolkit(toolkit_slug).await.map_err(|e| {
            e.during(
                "METADATA_FAILED",
                &format!("Failed to get metadata for {}", toolkit_slug),
            )
        })
    }

    /// Execute a tool on behalf of a user. Provider-side failures are
    /// reported in the response body rather than as an error.
    pub async fn execute_tool(
        &self,
        request: ToolExecutionRequest,
    ) -> Result<ToolExecutionResponse, ServerError> {
        require_non_empty(&request.tool_slug, "tool_slug")?;
        require_non_empty(&request.user_id, "user_id")?;

        match self
            .composio
            .execute_tool(&request.tool_slug, &request.user_id, request.parameters)
            .await
        {
            Ok(outcome) => Ok(ToolExecutionResponse {
                success: outcome.successful,
                result: outcome.data,
                error: outcome.error,
                tool_slug: request.tool_slug,
            }),
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", request.tool_slug, e);
                Ok(ToolExecutionResponse::failed(&request.tool_slug, e.to_string()))
            }
        }
    }
}
