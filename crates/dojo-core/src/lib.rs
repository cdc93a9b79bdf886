//! Dojo Core - transport-agnostic logic for Agent Dojo's toolkit integrations.
//!
//! This crate contains the Composio client, the connection store, the
//! integration manager, the OAuth connection flow, the tool-schema
//! renderer and a client for a running Dojo server. It has **no HTTP
//! framework dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `dojo-server`)
//! - CLI tools (via `dojo-cli`)
//!
//! # Feature Flags
//!
//! - `axum` - Enables `IntoResponse` impl on `ServerError` for use in axum handlers.
//! - `testing` - Exposes an in-process Composio fake for downstream tests.

pub mod composio;
pub mod db;
pub mod error;
pub mod integrations;
pub mod models;
pub mod oauth;
pub mod remote;
pub mod schema;
pub mod state;
pub mod store;

// Convenience re-exports
pub use db::Database;
pub use error::ServerError;
pub use integrations::IntegrationManager;
pub use state::{AppState, AppStateInner};
