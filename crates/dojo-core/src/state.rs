//! Shared application state for the axum server.

use std::sync::Arc;

use crate::error::ServerError;
use crate::integrations::IntegrationManager;

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    /// `None` when no Composio API key is configured.
    pub integrations: Option<IntegrationManager>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(integrations: Option<IntegrationManager>) -> Self {
        Self { integrations }
    }

    pub fn integrations(&self) -> Result<&IntegrationManager, ServerError> {
        self.integrations.as_ref().ok_or_else(|| {
            ServerError::Unavailable("Composio integration is not configured".to_string())
        })
    }
}
