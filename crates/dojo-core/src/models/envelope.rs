use serde::{Deserialize, Serialize};

/// `{ success, data, message }` wrapper shared by every integration route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    pub fn with_success(success: bool, data: T, message: impl Into<String>) -> Self {
        Self {
            success,
            data,
            message: message.into(),
        }
    }
}
