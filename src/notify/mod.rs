//! SMS notification providers

pub mod twilio;

pub use twilio::TwilioClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while sending a message
#[derive(Error, Debug)]
pub enum SmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected message ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("SMS provider unavailable: {0}")]
    Unavailable(String),
}

impl SmsError {
    /// Whether the provider call ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, SmsError::Http(e) if e.is_timeout())
    }
}

/// An SMS provider
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send `body` to `to`, returning the provider's response
    async fn send(&self, to: &str, body: &str) -> Result<Value, SmsError>;
}

/// Stand-in used when the SMS client could not be built at startup
pub struct UnavailableSms {
    reason: String,
}

impl UnavailableSms {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableSms {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SmsSender for UnavailableSms {
    async fn send(&self, _to: &str, _body: &str) -> Result<Value, SmsError> {
        Err(SmsError::Unavailable(self.reason.clone()))
    }
}
