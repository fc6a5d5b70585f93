pub mod auth;
pub mod webhook;

pub use auth::AuthGuard;
pub use webhook::{TelegramWebhookGuard, WebhookSignature};
