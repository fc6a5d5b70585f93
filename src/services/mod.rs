pub mod bot;
pub mod cache;
pub mod jwt;
pub mod notifier;
pub mod queue;
pub mod signature;
pub mod stats;
pub mod store;
pub mod submission;
pub mod telegram;
pub mod threshold;
pub mod whatsapp;

pub use bot::TelegramBot;
pub use cache::FormCache;
pub use jwt::JwtService;
pub use notifier::{NotificationOutcome, SubscriberNotifier};
pub use queue::NotificationQueue;
pub use submission::SubmissionService;
pub use telegram::TelegramChannel;
pub use threshold::RedirectDecision;
pub use whatsapp::WhatsappChannel;

use std::sync::Arc;

use log::{error, info, warn};
use rocket::fairing::AdHoc;

use crate::config::{Config, WebhookSecret};
use crate::db::{DbConn, MongoStore};

/// Builds the stores, channels, notifier, queue worker, bot and
/// submission service once and hands them to Rocket as managed state.
pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("Review pipeline", |rocket| async {
        let Some(db) = rocket.state::<DbConn>().cloned() else {
            error!("✗ Review pipeline needs a database connection");
            return Err(rocket);
        };

        let store = Arc::new(MongoStore::new(db));
        let mut notifier =
            SubscriberNotifier::new(store.clone(), Config::app_base_url(), Config::dispatch_timeout());

        match TelegramChannel::from_config() {
            Some(Ok(channel)) => {
                info!("✓ Telegram notifications enabled");
                notifier = notifier.with_channel(Arc::new(channel));
            }
            Some(Err(e)) => error!("✗ Failed to build Telegram client: {}", e),
            None => warn!("Telegram bot token not configured, Telegram subscribers will not be notified"),
        }

        match WhatsappChannel::from_config() {
            Some(Ok(channel)) => {
                info!("✓ WhatsApp notifications enabled");
                notifier = notifier.with_channel(Arc::new(channel));
            }
            Some(Err(e)) => error!("✗ Failed to build WhatsApp client: {}", e),
            None => warn!("MSG91 WhatsApp not configured, WhatsApp subscribers will not be notified"),
        }

        let notifier = Arc::new(notifier);
        let (queue, _worker) =
            NotificationQueue::start(notifier.clone(), Config::notification_queue_capacity());
        let bot = Arc::new(TelegramBot::new(store.clone(), store.clone()));
        let submissions = Arc::new(SubmissionService::new(store.clone(), store, queue));

        Ok(rocket
            .manage(notifier)
            .manage(submissions)
            .manage(bot)
            .manage(WebhookSecret(Config::webhook_secret()))
            .manage(FormCache::new(Config::form_cache_capacity(), Config::form_cache_ttl())))
    })
}
