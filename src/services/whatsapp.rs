use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::error::DispatchError;
use crate::models::ChannelKind;
use crate::services::store::MessagingChannel;

const MSG91_WHATSAPP_BASE: &str = "https://api.msg91.com/api/v5/whatsapp/whatsapp-outbound-message/";

/// WhatsApp delivery through the MSG91 gateway.
pub struct WhatsappChannel {
    client: Client,
    auth_key: String,
    integrated_number: String,
    endpoint: String,
}

impl WhatsappChannel {
    pub fn new(auth_key: String, integrated_number: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(WhatsappChannel {
            client: Client::builder().timeout(timeout).build()?,
            auth_key,
            integrated_number,
            endpoint: MSG91_WHATSAPP_BASE.to_string(),
        })
    }

    /// `None` unless MSG91 credentials and a sender number are configured.
    pub fn from_config() -> Option<Result<Self, reqwest::Error>> {
        if !Config::is_whatsapp_enabled() {
            return None;
        }
        let auth_key = Config::msg91_auth_key()?;
        let number = Config::msg91_whatsapp_number()?;
        Some(Self::new(auth_key, number, Config::dispatch_timeout()))
    }
}

/// MSG91 wants the number as bare digits with country code.
fn msisdn(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[rocket::async_trait]
impl MessagingChannel for WhatsappChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Whatsapp
    }

    async fn send_message(&self, identity: &str, text: &str) -> Result<(), DispatchError> {
        let body = json!({
            "integrated_number": self.integrated_number,
            "content_type": "text",
            "payload": {
                "to": msisdn(identity),
                "type": "text",
                "text": { "body": text },
            },
        });

        let res = self
            .client
            .post(&self.endpoint)
            .header("authkey", &self.auth_key)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_else(|_| "MSG91 error".to_string());
            return Err(DispatchError::Rejected(format!("{}: {}", status, detail)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msisdn_keeps_digits_only() {
        assert_eq!(msisdn("+91 98765-43210"), "919876543210");
    }
}
