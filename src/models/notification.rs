use serde::{Deserialize, Serialize};

/// Body of `POST /notify`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyRequest {
    pub to: Option<String>,
    pub message: Option<String>,
}

impl NotifyRequest {
    /// Both fields, if present and non-blank
    pub fn fields(&self) -> Option<(&str, &str)> {
        let to = self.to.as_deref().filter(|s| !s.trim().is_empty())?;
        let message = self.message.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((to, message))
    }
}

/// Successful response of `POST /notify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyResult {
    pub message: String,
    /// Provider response, passed through untouched
    pub result: serde_json::Value,
}

impl NotifyResult {
    pub fn sent(result: serde_json::Value) -> Self {
        NotifyResult {
            message: "Notification sent".to_string(),
            result,
        }
    }
}
