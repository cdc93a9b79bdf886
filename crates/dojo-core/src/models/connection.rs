use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a per-user toolkit connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Active,
    Pending,
    Failed,
    Expired,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Pending => "PENDING",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "FAILED" => Self::Failed,
            "EXPIRED" => Self::Expired,
            _ => Self::Pending,
        }
    }

    /// Map a Composio connected-account status onto our lifecycle.
    ///
    /// Anything the provider still considers in flight (`INITIATED`,
    /// `INITIALIZING`, ...) is `Pending`.
    pub fn from_upstream(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" | "CONNECTED" => Self::Active,
            "FAILED" | "ERROR" => Self::Failed,
            "EXPIRED" => Self::Expired,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally recorded connection between a user and a toolkit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    pub connection_id: String,
    pub app_type: String,
    pub user_id: String,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn pending(connection_id: String, app_type: String, user_id: String) -> Self {
        let now = Utc::now();
        Self {
            connection_id,
            app_type,
            user_id,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Connection as reported to clients in the per-user listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub app_type: String,
    pub status: ConnectionStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /connections/initiate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub toolkit_slug: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInitiateResponse {
    pub connection_id: String,
    pub auth_url: String,
    pub toolkit_slug: String,
    pub status: ConnectionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStatusResponse {
    pub connection_id: String,
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_mapping() {
        assert_eq!(ConnectionStatus::from_upstream("ACTIVE"), ConnectionStatus::Active);
        assert_eq!(ConnectionStatus::from_upstream("active"), ConnectionStatus::Active);
        assert_eq!(ConnectionStatus::from_upstream("FAILED"), ConnectionStatus::Failed);
        assert_eq!(ConnectionStatus::from_upstream("ERROR"), ConnectionStatus::Failed);
        assert_eq!(ConnectionStatus::from_upstream("EXPIRED"), ConnectionStatus::Expired);
        assert_eq!(ConnectionStatus::from_upstream("INITIATED"), ConnectionStatus::Pending);
        assert_eq!(ConnectionStatus::from_upstream("INITIALIZING"), ConnectionStatus::Pending);
        assert_eq!(ConnectionStatus::from_upstream(""), ConnectionStatus::Pending);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_value(ConnectionStatus::Pending).unwrap();
        assert_eq!(json, "PENDING");
        let back: ConnectionStatus = serde_json::from_value(serde_json::json!("EXPIRED")).unwrap();
        assert_eq!(back, ConnectionStatus::Expired);
        assert!(back.is_terminal());
        assert!(!ConnectionStatus::Pending.is_terminal());
    }
}
