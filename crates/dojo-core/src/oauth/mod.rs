//! OAuth connection flow: initiate, open the provider's consent page, and
//! watch the connection until it settles.
//!
//! The flow is split in two:
//!
//! - [`machine`] - a pure `(state, event) -> (state, effects)` transition
//!   function.
//! - [`modal`] - [`ConnectionModal`], the async driver that runs the two
//!   timers (status poll and window liveness) and interprets effects.
//!
//! The driver talks to the backend through [`ConnectionApi`] and to the
//! consent page through [`AuthWindow`], so the same flow works in-process
//! against an [`IntegrationManager`] or remotely against a running server.

pub mod machine;
pub mod modal;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServerError;
use crate::integrations::IntegrationManager;
use crate::models::{ConnectionInitiateResponse, ConnectionStatusResponse};

pub use machine::{transition, Effect, FlowEvent, FlowState};
pub use modal::{ConnectionModal, FlowOutcome};

#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// How often the connection status is polled.
    pub status_interval: Duration,
    /// How often the auth window is checked for having been closed.
    pub liveness_interval: Duration,
    /// Overall deadline for the user to finish authorizing. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Consecutive failed status checks before a warning is surfaced.
    pub poll_error_threshold: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(2),
            liveness_interval: Duration::from_secs(1),
            timeout: Some(Duration::from_secs(10 * 60)),
            poll_error_threshold: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("A connection flow is already in progress")]
    AlreadyInFlight,

    #[error("Failed to initiate connection: {0}")]
    Initiate(#[source] ServerError),

    #[error("Auth window error: {0}")]
    Window(String),

    #[error("{reason}")]
    Failed {
        connection_id: Option<String>,
        reason: String,
    },

    #[error("Timed out waiting for authorization of {connection_id}")]
    TimedOut { connection_id: String },
}

/// Backend operations the flow needs.
#[async_trait]
pub trait ConnectionApi: Send + Sync {
    async fn initiate(
        &self,
        toolkit_slug: &str,
        user_id: &str,
    ) -> Result<ConnectionInitiateResponse, ServerError>;

    async fn status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ServerError>;
}

/// The surface showing the provider's consent page.
#[async_trait]
pub trait AuthWindow: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), FlowError>;

    /// `true` once the user has dismissed the window.
    async fn is_closed(&self) -> bool;

    async fn close(&self);
}

/// Receives the user-facing outcomes of a flow.
pub trait FlowListener: Send + Sync {
    fn on_connected(&self, connection_id: &str) {
        tracing::info!("Connection {} is active", connection_id);
    }

    fn on_error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn on_warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Listener that only logs.
pub struct LogListener;

impl FlowListener for LogListener {}

#[async_trait]
impl ConnectionApi for IntegrationManager {
    async fn initiate(
        &self,
        toolkit_slug: &str,
        user_id: &str,
    ) -> Result<ConnectionInitiateResponse, ServerError> {
        self.initiate_connection(toolkit_slug, user_id).await
    }

    async fn status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ServerError> {
        self.check_status(connection_id).await
    }
}
