use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use shared_config::ClinicConfig;

use crate::models::{ChannelKind, Contact, Notice};
use crate::services::dispatcher::NotificationChannel;

/// HTTP SMS gateway channel (basic-auth JSON API).
pub struct SmsGatewayChannel {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl SmsGatewayChannel {
    pub fn new(config: &ClinicConfig) -> Self {
        Self::with_settings(
            config.sms_gateway_url.clone(),
            config.sms_gateway_username.clone(),
            config.sms_gateway_password.clone(),
        )
    }

    pub fn with_settings(base_url: String, username: String, password: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            username,
            password,
        }
    }
}

#[async_trait]
impl NotificationChannel for SmsGatewayChannel {
    fn name(&self) -> &'static str {
        "sms-gateway"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Phone
    }

    async fn deliver(&self, contact: &Contact, notice: &Notice) -> Result<()> {
        let phone = contact
            .phone
            .as_deref()
            .ok_or_else(|| anyhow!("contact has no phone number"))?;

        debug!("Sending SMS to {}", phone);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({
                "textMessage": { "text": notice.sms_text },
                "phoneNumbers": [phone]
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            bail!("SMS gateway error ({}): {}", status, error_text);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notice() -> Notice {
        Notice {
            subject: "Test".to_string(),
            sms_text: "Test message".to_string(),
            email_html: "<p>Test message</p>".to_string(),
        }
    }

    fn contact() -> Contact {
        Contact {
            name: "Asha".to_string(),
            phone: Some("+919876543210".to_string()),
            email: None,
        }
    }

    #[tokio::test]
    async fn posts_message_to_gateway() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({
                "phoneNumbers": ["+919876543210"]
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let channel =
            SmsGatewayChannel::with_settings(server.uri(), "user".to_string(), "pass".to_string());

        channel.deliver(&contact(), &notice()).await.unwrap();
    }

    #[tokio::test]
    async fn gateway_failure_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let channel =
            SmsGatewayChannel::with_settings(server.uri(), "user".to_string(), "pass".to_string());

        let err = channel.deliver(&contact(), &notice()).await.unwrap_err();
        assert!(err.to_string().contains("SMS gateway error"));
    }
}
