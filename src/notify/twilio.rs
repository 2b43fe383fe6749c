//! Twilio Programmable Messaging client

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use super::{SmsError, SmsSender};
use crate::config::SmsConfig;

/// Sends SMS through the Twilio REST API from a fixed sender number
#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    messages_url: Url,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    pub fn new(client: Client, config: &SmsConfig) -> Result<Self, SmsError> {
        let invalid = |e: String| SmsError::InvalidUrl(format!("{}: {}", config.base_url, e));

        let mut messages_url = Url::parse(&config.base_url).map_err(|e| invalid(e.to_string()))?;
        messages_url
            .path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["2010-04-01", "Accounts", config.account_sid.as_str(), "Messages.json"]);

        Ok(TwilioClient {
            client,
            messages_url,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        })
    }
}

#[async_trait]
impl SmsSender for TwilioClient {
    async fn send(&self, to: &str, body: &str) -> Result<Value, SmsError> {
        let response = self
            .client
            .post(self.messages_url.clone())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Twilio error bodies look like {"code": 21211, "message": "...", "status": 400}
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            return Err(SmsError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let result: Value = response.json().await?;
        log::debug!(
            "Twilio accepted message {}",
            result.get("sid").and_then(Value::as_str).unwrap_or("?")
        );
        Ok(result)
    }
}
