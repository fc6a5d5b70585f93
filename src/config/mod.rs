use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;
use std::time::Duration;

pub struct Config;

/// Relay secret resolved at ignite and held as managed state.
pub struct WebhookSecret(pub Option<String>);

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").ignore(&["PROFILE"]).global())
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "reviewflow".to_string())
    }

    /// Base URL of the owner dashboard, used for links inside notifications.
    pub fn app_base_url() -> String {
        Self::figment()
            .extract_inner::<String>("app_base_url")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn telegram_bot_token() -> Option<String> {
        Self::figment()
            .extract_inner("telegram_bot_token")
            .ok()
    }

    pub fn telegram_webhook_secret() -> Option<String> {
        Self::figment()
            .extract_inner("telegram_webhook_secret")
            .ok()
    }

    pub fn msg91_auth_key() -> Option<String> {
        Self::figment()
            .extract_inner("msg91_auth_key")
            .ok()
    }

    pub fn msg91_whatsapp_number() -> Option<String> {
        Self::figment()
            .extract_inner("msg91_whatsapp_number")
            .ok()
    }

    pub fn is_whatsapp_enabled() -> bool {
        Self::msg91_auth_key().is_some()
            && Self::msg91_whatsapp_number().is_some()
    }

    /// Shared secret for the signed review-created webhook.
    pub fn webhook_secret() -> Option<String> {
        Self::figment()
            .extract_inner("webhook_secret")
            .ok()
    }

    pub fn dispatch_timeout() -> Duration {
        let secs: u64 = Self::figment()
            .extract_inner("dispatch_timeout_secs")
            .unwrap_or(5);
        Duration::from_secs(secs.max(1))
    }

    pub fn notification_queue_capacity() -> usize {
        Self::figment()
            .extract_inner("notification_queue_capacity")
            .unwrap_or(1024)
    }

    pub fn form_cache_capacity() -> usize {
        Self::figment()
            .extract_inner("form_cache_capacity")
            .unwrap_or(256)
    }

    pub fn form_cache_ttl() -> Duration {
        let secs: u64 = Self::figment()
            .extract_inner("form_cache_ttl_secs")
            .unwrap_or(60);
        Duration::from_secs(secs)
    }
}
