use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    Whatsapp,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Telegram => "telegram",
            ChannelKind::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "Notify `identity` on `channel` when `form_id` receives a review."
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscriber {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub form_id: ObjectId,
    pub channel: ChannelKind,
    pub identity: String, // chat id or phone number
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WhatsappSubscribeDto {
    pub phone: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SubscriberResponse {
    pub id: String,
    pub channel: ChannelKind,
    pub identity: String,
    pub created_at: String,
}

impl From<Subscriber> for SubscriberResponse {
    fn from(subscriber: Subscriber) -> Self {
        SubscriberResponse {
            id: subscriber.id.map(|id| id.to_hex()).unwrap_or_default(),
            channel: subscriber.channel,
            identity: subscriber.identity,
            created_at: subscriber.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
