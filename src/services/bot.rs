use std::sync::Arc;

use log::{info, warn};
use serde::Deserialize;

use crate::error::StoreError;
use crate::models::ChannelKind;
use crate::services::notifier::escape_html;
use crate::services::store::{FormStore, SubscriberStore};

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub my_chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub new_chat_member: ChatMember,
}

#[derive(Debug, Deserialize)]
pub struct ChatMember {
    pub status: String,
}

impl ChatMemberUpdated {
    /// The user blocked the bot or removed it from the group.
    pub fn bot_removed(&self) -> bool {
        matches!(self.new_chat_member.status.as_str(), "kicked" | "left")
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Subscribe(String),
    Unsubscribe(Option<String>),
    List,
    Unknown(String),
}

/// `None` for plain chatter that isn't a command.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    // group chats send "/subscribe@SomeBot"
    let name = head[1..].split('@').next().unwrap_or("").to_lowercase();
    let arg = parts.next().map(str::to_string);

    Some(match (name.as_str(), arg) {
        ("start", Some(form_id)) | ("subscribe", Some(form_id)) => BotCommand::Subscribe(form_id),
        ("start", None) | ("help", _) | ("subscribe", None) => BotCommand::Help,
        ("unsubscribe", arg) | ("stop", arg) => BotCommand::Unsubscribe(arg),
        ("list", _) => BotCommand::List,
        (other, _) => BotCommand::Unknown(other.to_string()),
    })
}

pub fn help_text() -> &'static str {
    "👋 I send you new reviews as they arrive.\n\n\
     /subscribe &lt;form_id&gt; - get notified for a form\n\
     /unsubscribe &lt;form_id&gt; - stop notifications for a form\n\
     /unsubscribe - stop all notifications\n\
     /list - show your subscriptions"
}

/// Applies bot updates to the subscriber list.
pub struct TelegramBot {
    forms: Arc<dyn FormStore>,
    subscribers: Arc<dyn SubscriberStore>,
}

impl TelegramBot {
    pub fn new(forms: Arc<dyn FormStore>, subscribers: Arc<dyn SubscriberStore>) -> Self {
        TelegramBot { forms, subscribers }
    }

    /// Returns the chat to answer and the reply text, if the update calls for one.
    pub async fn handle(&self, update: Update) -> Option<(String, String)> {
        if let Some(member) = update.my_chat_member {
            if member.bot_removed() {
                let chat = member.chat.id.to_string();
                match self.subscribers.remove_subscribers(ChannelKind::Telegram, &chat).await {
                    Ok(count) => info!("Chat {} removed the bot, dropped {} subscriptions", chat, count),
                    Err(e) => warn!("Failed to drop subscriptions for chat {}: {}", chat, e),
                }
            }
            return None;
        }

        let message = update.message?;
        let command = message.text.as_deref().and_then(parse_command)?;
        let chat = message.chat.id.to_string();

        let reply = match self.run(&chat, command).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Bot command from chat {} failed: {}", chat, e);
                "⚠️ Something went wrong, please try again later.".to_string()
            }
        };
        Some((chat, reply))
    }

    async fn run(&self, chat: &str, command: BotCommand) -> Result<String, StoreError> {
        let telegram = ChannelKind::Telegram;

        match command {
            BotCommand::Help => Ok(help_text().to_string()),
            BotCommand::Unknown(name) => Ok(format!(
                "Unknown command /{}\n\n{}",
                escape_html(&name),
                help_text()
            )),
            BotCommand::Subscribe(form_id) => {
                let Some(form) = self.forms.get_form(&form_id).await? else {
                    return Ok("❌ Form not found. Check the ID in your dashboard.".to_string());
                };
                let form_object_id = form
                    .id
                    .ok_or_else(|| StoreError("Form without an id".to_string()))?;

                if self.subscribers.add_subscriber(form_object_id, telegram, chat).await? {
                    info!("Chat {} subscribed to form {}", chat, form_id);
                }
                Ok(format!(
                    "✅ You will be notified about new reviews for <b>{}</b>.",
                    escape_html(&form.name)
                ))
            }
            BotCommand::Unsubscribe(Some(form_id)) => {
                let removed = self.subscribers.remove_subscriber(&form_id, telegram, chat).await?;
                Ok(if removed {
                    "🔕 Unsubscribed.".to_string()
                } else {
                    "You were not subscribed to that form.".to_string()
                })
            }
            BotCommand::Unsubscribe(None) => {
                let count = self.subscribers.remove_subscribers(telegram, chat).await?;
                Ok(format!("🔕 Removed {} subscription(s).", count))
            }
            BotCommand::List => {
                let subscribed = self.subscribers.list_for_identity(telegram, chat).await?;
                if subscribed.is_empty() {
                    return Ok("You have no subscriptions yet.".to_string());
                }

                let mut lines = Vec::with_capacity(subscribed.len());
                for subscription in &subscribed {
                    if let Some(form) = self.forms.get_form(&subscription.form_id.to_hex()).await? {
                        lines.push(format!(
                            "• <b>{}</b> (<code>{}</code>)",
                            escape_html(&form.name),
                            form.id_hex()
                        ));
                    }
                }
                Ok(format!("Your subscriptions:\n{}", lines.join("\n")))
            }
        }
    }
}
