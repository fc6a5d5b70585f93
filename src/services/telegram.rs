use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::error::DispatchError;
use crate::models::ChannelKind;
use crate::services::store::MessagingChannel;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends HTML-formatted messages through the Telegram Bot API.
pub struct TelegramChannel {
    client: Client,
    token: String,
    api_base: String,
}

impl TelegramChannel {
    pub fn new(token: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(TelegramChannel {
            client: Client::builder().timeout(timeout).build()?,
            token,
            api_base: TELEGRAM_API.to_string(),
        })
    }

    pub fn from_config() -> Option<Result<Self, reqwest::Error>> {
        let token = Config::telegram_bot_token()?;
        Some(Self::new(token, Config::dispatch_timeout()))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

#[rocket::async_trait]
impl MessagingChannel for TelegramChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn send_message(&self, identity: &str, text: &str) -> Result<(), DispatchError> {
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": identity,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        // Telegram reports failures (blocked bot, deleted chat) in the body
        let status = res.status();
        let body: TelegramResponse = res.json().await?;
        if !status.is_success() || !body.ok {
            return Err(DispatchError::Rejected(
                body.description.unwrap_or_else(|| status.to_string()),
            ));
        }

        Ok(())
    }
}
