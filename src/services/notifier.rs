use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rocket::futures::future::join_all;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use crate::error::{DispatchError, PipelineError};
use crate::models::{ChannelKind, Form, ReviewPayload, Subscriber};
use crate::services::store::{FormStore, MessagingChannel};
use crate::services::threshold::{validate_rating, RATING_MAX};

const COMMENT_EXCERPT_CHARS: usize = 280;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct DeliveryCounts {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryCounts {
    fn record(&mut self, delivered: bool) {
        self.attempted += 1;
        if delivered {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, JsonSchema)]
pub struct NotificationOutcome {
    pub total: DeliveryCounts,
    pub channels: BTreeMap<ChannelKind, DeliveryCounts>,
}

impl NotificationOutcome {
    fn record(&mut self, channel: ChannelKind, delivered: bool) {
        self.total.record(delivered);
        self.channels.entry(channel).or_default().record(delivered);
    }

    pub fn channel(&self, channel: ChannelKind) -> DeliveryCounts {
        self.channels.get(&channel).copied().unwrap_or_default()
    }
}

/// Fans a new review out to everyone subscribed to its form.
pub struct SubscriberNotifier {
    forms: Arc<dyn FormStore>,
    channels: HashMap<ChannelKind, Arc<dyn MessagingChannel>>,
    app_base_url: String,
    dispatch_timeout: Duration,
}

impl SubscriberNotifier {
    pub fn new(
        forms: Arc<dyn FormStore>,
        app_base_url: impl Into<String>,
        dispatch_timeout: Duration,
    ) -> Self {
        SubscriberNotifier {
            forms,
            channels: HashMap::new(),
            app_base_url: app_base_url.into(),
            dispatch_timeout,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn MessagingChannel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<Arc<dyn MessagingChannel>> {
        self.channels.get(&kind).cloned()
    }

    /// Only an out-of-range rating, an unknown form or an unreadable store
    /// is an error; dispatch failures are counted in the outcome.
    pub async fn notify(
        &self,
        form_id: &str,
        review: &ReviewPayload,
    ) -> Result<NotificationOutcome, PipelineError> {
        validate_rating(review.rating)?;

        let form = self
            .forms
            .get_form(form_id)
            .await?
            .ok_or_else(|| PipelineError::FormNotFound(form_id.to_string()))?;

        let subscribers = self.forms.list_subscribers(form_id).await?;
        if subscribers.is_empty() {
            info!("Form {} has no subscribers, nothing to notify", form_id);
            return Ok(NotificationOutcome::default());
        }

        let link = format!("{}/dashboard/forms/{}/reviews", self.app_base_url, form_id);
        let results = join_all(
            subscribers
                .iter()
                .map(|subscriber| self.dispatch(subscriber, &form, review, &link)),
        )
        .await;

        let mut outcome = NotificationOutcome::default();
        for (subscriber, result) in subscribers.iter().zip(results) {
            match result {
                Ok(()) => outcome.record(subscriber.channel, true),
                Err(e) => {
                    warn!(
                        "Notification to {} subscriber {} for form {} failed: {}",
                        subscriber.channel, subscriber.identity, form_id, e
                    );
                    outcome.record(subscriber.channel, false);
                }
            }
        }

        info!(
            "Notified form {}: attempted={} delivered={} failed={}",
            form_id, outcome.total.attempted, outcome.total.delivered, outcome.total.failed
        );
        Ok(outcome)
    }

    async fn dispatch(
        &self,
        subscriber: &Subscriber,
        form: &Form,
        review: &ReviewPayload,
        link: &str,
    ) -> Result<(), DispatchError> {
        let channel = self
            .channels
            .get(&subscriber.channel)
            .ok_or(DispatchError::ChannelUnavailable(subscriber.channel))?;

        let text = format_message(subscriber.channel, form, review, link);
        tokio::time::timeout(
            self.dispatch_timeout,
            channel.send_message(&subscriber.identity, &text),
        )
        .await
        .map_err(|_| DispatchError::Timeout(self.dispatch_timeout))?
    }
}

pub fn format_message(kind: ChannelKind, form: &Form, review: &ReviewPayload, link: &str) -> String {
    let rating = review.rating.clamp(0, RATING_MAX) as usize;
    let stars = format!(
        "{}{}",
        "★".repeat(rating),
        "☆".repeat(RATING_MAX as usize - rating)
    );
    let mood = match review.is_positive {
        Some(true) => "👍",
        Some(false) => "👎",
        None => "📝",
    };

    match kind {
        ChannelKind::Telegram => {
            let mut text = format!(
                "{} New review for <b>{}</b>\n{} ({}/{})",
                mood,
                escape_html(&form.name),
                stars,
                review.rating,
                RATING_MAX
            );
            if let Some(comment) = comment_excerpt(review) {
                text.push_str(&format!("\n\n💬 {}", escape_html(&comment)));
            }
            if let Some(name) = &review.contact_name {
                text.push_str(&format!("\n👤 {}", escape_html(name)));
            }
            text.push_str(&format!("\n\n<a href=\"{}\">Open reviews</a>", escape_html(link)));
            text
        }
        ChannelKind::Whatsapp => {
            let mut text = format!(
                "{} New review for *{}*\n{} ({}/{})",
                mood, form.name, stars, review.rating, RATING_MAX
            );
            if let Some(comment) = comment_excerpt(review) {
                text.push_str(&format!("\n\n💬 {}", comment));
            }
            if let Some(name) = &review.contact_name {
                text.push_str(&format!("\n👤 {}", name));
            }
            text.push_str(&format!("\n\nOpen reviews: {}", link));
            text
        }
    }
}

fn comment_excerpt(review: &ReviewPayload) -> Option<String> {
    let comment = review.comment.as_deref()?.trim();
    if comment.is_empty() {
        return None;
    }
    if comment.chars().count() <= COMMENT_EXCERPT_CHARS {
        return Some(comment.to_string());
    }
    let mut excerpt: String = comment.chars().take(COMMENT_EXCERPT_CHARS).collect();
    excerpt.push('…');
    Some(excerpt)
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_form;
    use crate::services::store::memory::{MemoryStore, RecordingChannel};
    use std::sync::atomic::Ordering;

    fn payload(rating: i32, comment: &str) -> ReviewPayload {
        ReviewPayload {
            review_id: None,
            rating,
            comment: Some(comment.to_string()),
            contact_name: None,
            is_positive: Some(rating >= 4),
        }
    }

    fn notifier(store: Arc<MemoryStore>, channel: Arc<RecordingChannel>) -> SubscriberNotifier {
        SubscriberNotifier::new(store, "https://app.test", Duration::from_millis(200))
            .with_channel(channel)
    }

    #[tokio::test]
    async fn unknown_form_is_rejected_before_fan_out() {
        let store = Arc::new(MemoryStore::default());
        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram));
        let notifier = notifier(store, channel.clone());

        let result = notifier.notify("missing", &payload(5, "great")).await;
        assert!(matches!(result, Err(PipelineError::FormNotFound(_))));
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_before_fan_out() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form.clone()));
        store.subscribe(&form, ChannelKind::Telegram, "1");
        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram));
        let notifier = notifier(store, channel.clone());

        for rating in [0, 9] {
            let result = notifier.notify(&form_id, &payload(rating, "odd")).await;
            assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        }
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_subscribers_is_not_an_error() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form));
        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram));

        let outcome = notifier(store, channel)
            .notify(&form_id, &payload(5, "great"))
            .await
            .unwrap();
        assert_eq!(outcome.total, DeliveryCounts::default());
    }

    #[tokio::test]
    async fn one_failing_subscriber_does_not_stop_the_others() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form.clone()));
        for chat in ["100", "200", "300"] {
            store.subscribe(&form, ChannelKind::Telegram, chat);
        }
        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram).failing_for("200"));

        let outcome = notifier(store, channel.clone())
            .notify(&form_id, &payload(2, "cold coffee"))
            .await
            .unwrap();

        let expected = DeliveryCounts { attempted: 3, delivered: 2, failed: 1 };
        assert_eq!(outcome.total, expected);
        assert_eq!(outcome.channel(ChannelKind::Telegram), expected);
        assert_eq!(channel.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn hanging_dispatch_times_out_individually() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form.clone()));
        store.subscribe(&form, ChannelKind::Telegram, "slow");
        store.subscribe(&form, ChannelKind::Telegram, "fast");
        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram).hanging_for("slow"));

        let outcome = notifier(store, channel.clone())
            .notify(&form_id, &payload(5, "lovely"))
            .await
            .unwrap();

        assert_eq!(outcome.total, DeliveryCounts { attempted: 2, delivered: 1, failed: 1 });
        assert_eq!(channel.sent.lock().unwrap()[0].0, "fast");
    }

    #[tokio::test]
    async fn unconfigured_channel_counts_as_failure() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form.clone()));
        store.subscribe(&form, ChannelKind::Telegram, "100");
        store.subscribe(&form, ChannelKind::Whatsapp, "+919876543210");
        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram));

        let outcome = notifier(store, channel)
            .notify(&form_id, &payload(5, "ok"))
            .await
            .unwrap();

        assert_eq!(outcome.channel(ChannelKind::Telegram).delivered, 1);
        assert_eq!(
            outcome.channel(ChannelKind::Whatsapp),
            DeliveryCounts { attempted: 1, delivered: 0, failed: 1 }
        );
    }

    #[test]
    fn telegram_message_escapes_and_links_back() {
        let mut form = sample_form(4);
        form.name = "Fish & Chips".to_string();
        let review = ReviewPayload {
            contact_name: Some("Ana".to_string()),
            ..payload(3, "<script>")
        };

        let text = format_message(ChannelKind::Telegram, &form, &review, "https://app.test/x");
        assert!(text.contains("Fish &amp; Chips"));
        assert!(text.contains("&lt;script&gt;"));
        assert!(text.contains("★★★☆☆ (3/5)"));
        assert!(text.contains("👤 Ana"));
        assert!(text.contains("href=\"https://app.test/x\""));
    }

    #[test]
    fn long_comments_are_truncated() {
        let form = sample_form(4);
        let review = payload(1, &"a".repeat(500));

        let text = format_message(ChannelKind::Whatsapp, &form, &review, "l");
        assert!(text.contains(&format!("{}…", "a".repeat(COMMENT_EXCERPT_CHARS))));
        assert!(!text.contains(&"a".repeat(COMMENT_EXCERPT_CHARS + 1)));
    }
}
