//! Core error type for Agent Dojo.
//!
//! `ServerError` is used throughout the core domain (store, Composio client,
//! integration manager). When the `axum` feature is enabled, it also
//! implements `IntoResponse` so it can be used directly as an axum handler
//! error type.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {message}")]
    BadRequest { code: &'static str, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {message}")]
    Internal { code: &'static str, message: String },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The upstream service answered with a non-success status.
    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The request never completed (connect error, timeout, broken body).
    #[error("Network failure: {0}")]
    Network(String),
}

impl ServerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }

    /// Re-label an upstream/internal failure with an operation-specific code.
    ///
    /// Errors that already describe the caller's mistake (bad request, not
    /// found, unavailable) keep their own classification.
    pub fn during(self, code: &'static str, context: &str) -> Self {
        match self {
            Self::Upstream { .. } | Self::Network(_) | Self::Internal { .. } | Self::Database(_) => {
                Self::Internal {
                    code,
                    message: format!("{}: {}", context, self),
                }
            }
            other => other,
        }
    }

    /// Stable, machine-readable error code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest { code, .. } => code,
            Self::Conflict(_) => "CONFLICT",
            Self::Internal { code, .. } => code,
            Self::Unavailable(_) => "COMPOSIO_UNAVAILABLE",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
        }
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ServerError::Upstream {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => ServerError::Network(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Internal { message, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            }
            ServerError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ServerError::Upstream { .. } | ServerError::Network(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!("{} ({})", message, self.code());
        }

        let body = serde_json::json!({ "error": self.code(), "message": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Malformed or mistyped JSON bodies answer with the usual error body.
#[cfg(feature = "axum")]
impl From<axum::extract::rejection::JsonRejection> for ServerError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_during_relabels_upstream_failures_only() {
        let err = ServerError::Network("connection refused".into())
            .during("STATUS_CHECK_FAILED", "Failed to check connection status");
        assert_eq!(err.code(), "STATUS_CHECK_FAILED");
        assert!(err.to_string().contains("connection refused"));

        let err = ServerError::bad_request("empty user id").during("X", "ignored");
        assert_eq!(err.code(), "BAD_REQUEST");
    }
}
