//! In-process stand-in for the Composio API, used by tests.
//!
//! Connected accounts start `INITIATED`; tests move them along with
//! [`FakeComposio::set_status`]. The `gmail` toolkit exposes one tool with a
//! nested input schema, `BROKEN_TOOL` always fails to execute.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};

use super::{ComposioApi, ConnectedAccount, ConnectionRequestHandle, ExecutionOutcome};
use crate::error::ServerError;
use crate::models::ToolDefinition;

#[derive(Default)]
struct FakeState {
    next_id: u64,
    auth_configs: HashMap<String, String>,
    accounts: HashMap<String, ConnectedAccount>,
    created_auth_configs: usize,
    fail_next_initiate: bool,
}

#[derive(Default)]
pub struct FakeComposio {
    state: Mutex<FakeState>,
}

impl FakeComposio {
    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, connection_id: &str, status: &str) {
        if let Some(account) = self.lock().accounts.get_mut(connection_id) {
            account.status = status.to_string();
            account.updated_at = Some(Utc::now());
        }
    }

    pub fn created_auth_configs(&self) -> usize {
        self.lock().created_auth_configs
    }

    pub fn fail_next_initiate(&self) {
        self.lock().fail_next_initiate = true;
    }

    pub fn gmail_send_email() -> ToolDefinition {
        ToolDefinition {
            name: "Send Email".to_string(),
            slug: "GMAIL_SEND_EMAIL".to_string(),
            description: "Send an email from the connected Gmail account".to_string(),
            input_parameters: json!({
                "type": "object",
                "properties": {
                    "recipient_email": { "type": "string", "description": "Primary recipient" },
                    "cc": { "type": "array", "items": { "type": "string" } },
                    "body": {
                        "type": "object",
                        "properties": {
                            "text": { "type": "string" },
                            "is_html": { "type": "boolean", "default": false }
                        }
                    }
                },
                "required": ["recipient_email"]
            })
            .into(),
            output_parameters: json!({
                "type": "object",
                "properties": { "id": { "type": "string" } }
            })
            .into(),
            scopes: vec!["https://www.googleapis.com/auth/gmail.send".to_string()],
            no_auth: false,
            version: None,
        }
    }
}

#[async_trait]
impl ComposioApi for FakeComposio {
    async fn find_auth_config(&self, toolkit_slug: &str) -> Result<Option<String>, ServerError> {
        Ok(self.lock().auth_configs.get(toolkit_slug).cloned())
    }

    async fn create_auth_config(&self, toolkit_slug: &str) -> Result<String, ServerError> {
        let mut state = self.lock();
        state.created_auth_configs += 1;
        let id = format!("ac_{}", toolkit_slug);
        state.auth_configs.insert(toolkit_slug.to_string(), id.clone());
        Ok(id)
    }

    async fn initiate_connection(
        &self,
        user_id: &str,
        auth_config_id: &str,
    ) -> Result<ConnectionRequestHandle, ServerError> {
        let mut state = self.lock();
        if std::mem::take(&mut state.fail_next_initiate) {
            return Err(ServerError::Upstream {
                status: 500,
                body: "auth config misconfigured".to_string(),
            });
        }
        state.next_id += 1;
        let id = format!("ca_{}", state.next_id);
        let toolkit = auth_config_id.trim_start_matches("ac_").to_string();
        state.accounts.insert(
            id.clone(),
            ConnectedAccount {
                id: id.clone(),
                status: "INITIATED".to_string(),
                toolkit_slug: Some(toolkit),
                user_id: Some(user_id.to_string()),
                created_at: Some(Utc::now()),
                updated_at: None,
            },
        );
        Ok(ConnectionRequestHandle {
            redirect_url: format!("https://auth.example.test/authorize?connection={}", id),
            id,
            status: "INITIATED".to_string(),
        })
    }

    async fn get_connected_account(
        &self,
        connection_id: &str,
    ) -> Result<ConnectedAccount, ServerError> {
        self.lock()
            .accounts
            .get(connection_id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("Connection {} not found", connection_id)))
    }

    async fn list_connected_accounts(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectedAccount>, ServerError> {
        let mut accounts: Vec<ConnectedAccount> = self
            .lock()
            .accounts
            .values()
            .filter(|a| a.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    async fn delete_connected_account(&self, connection_id: &str) -> Result<(), ServerError> {
        self.lock()
            .accounts
            .remove(connection_id)
            .map(|_| ())
            .ok_or_else(|| ServerError::Upstream {
                status: 404,
                body: format!("{} not found", connection_id),
            })
    }

    async fn list_tools(&self, toolkit_slug: &str) -> Result<Vec<ToolDefinition>, ServerError> {
        Ok(match toolkit_slug {
            "gmail" => vec![Self::gmail_send_email()],
            _ => Vec::new(),
        })
    }

    async fn get_toolkit(&self, toolkit_slug: &str) -> Result<Value, ServerError> {
        Ok(json!({ "slug": toolkit_slug, "meta": { "tools_count": 1 } }))
    }

    async fn execute_tool(
        &self,
        tool_slug: &str,
        _user_id: &str,
        arguments: Map<String, Value>,
    ) -> Result<ExecutionOutcome, ServerError> {
        if tool_slug == "BROKEN_TOOL" {
            return Err(ServerError::Network("connection reset by peer".to_string()));
        }
        Ok(ExecutionOutcome {
            successful: true,
            data: Some(json!({ "echo": arguments })),
            error: None,
        })
    }
}
