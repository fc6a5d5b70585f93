use std::sync::Arc;

use log::warn;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use serde::Deserialize;

use crate::config::WebhookSecret;
use crate::guards::{TelegramWebhookGuard, WebhookSignature};
use crate::models::{ChannelKind, ReviewPayload};
use crate::services::bot::Update;
use crate::services::store::MessagingChannel;
use crate::services::{signature, NotificationOutcome, SubscriberNotifier, TelegramBot};
use crate::utils::{ApiError, ApiResponse};

/// Row-change event relayed by the database's webhook integration.
#[derive(Debug, Deserialize)]
pub struct ReviewCreatedEvent {
    pub record: ReviewRecord,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRecord {
    pub id: Option<String>,
    pub form_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub contact_name: Option<String>,
    pub is_positive: Option<bool>,
}

impl From<ReviewRecord> for ReviewPayload {
    fn from(record: ReviewRecord) -> Self {
        ReviewPayload {
            review_id: record.id,
            rating: record.rating,
            comment: record.comment,
            contact_name: record.contact_name,
            is_positive: record.is_positive,
        }
    }
}

#[openapi(skip)]
#[post("/webhooks/review-created", data = "<body>")]
pub async fn review_created(
    notifier: &State<Arc<SubscriberNotifier>>,
    secret: &State<WebhookSecret>,
    signed: WebhookSignature,
    body: String,
) -> Result<Json<ApiResponse<NotificationOutcome>>, ApiError> {
    let secret = secret
        .0
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Webhook relay not configured"))?;

    if !signature::verify(secret, body.as_bytes(), &signed.0) {
        return Err(ApiError::unauthorized("Invalid webhook signature"));
    }

    let event: ReviewCreatedEvent = serde_json::from_str(&body)
        .map_err(|e| ApiError::bad_request(format!("Malformed payload: {}", e)))?;
    let form_id = event.record.form_id.clone();

    let outcome = notifier.notify(&form_id, &ReviewPayload::from(event.record)).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Always answers 200 so Telegram does not redeliver the update.
#[openapi(skip)]
#[post("/webhooks/telegram", data = "<update>")]
pub async fn telegram_update(
    bot: &State<Arc<TelegramBot>>,
    notifier: &State<Arc<SubscriberNotifier>>,
    _guard: TelegramWebhookGuard,
    update: Json<Update>,
) -> Status {
    let Some((chat, reply)) = bot.handle(update.into_inner()).await else {
        return Status::Ok;
    };

    match notifier.channel(ChannelKind::Telegram) {
        Some(channel) => {
            if let Err(e) = channel.send_message(&chat, &reply).await {
                warn!("Failed to reply to chat {}: {}", chat, e);
            }
        }
        None => warn!("Telegram channel not configured, dropping bot reply"),
    }

    Status::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use rocket::http::{ContentType, Header};
    use rocket::local::asynchronous::Client;

    use crate::models::sample_form;
    use crate::services::store::memory::{MemoryStore, RecordingChannel};

    const SECRET: &str = "relay-secret";

    #[test]
    fn decodes_relayed_review() {
        let event: ReviewCreatedEvent = serde_json::from_str(
            r#"{"type":"INSERT","table":"reviews","record":{"id":"r1","form_id":"f1","rating":2,"comment":"meh","is_positive":false}}"#,
        )
        .unwrap();

        let form_id = event.record.form_id.clone();
        let payload = ReviewPayload::from(event.record);
        assert_eq!(form_id, "f1");
        assert_eq!(payload.rating, 2);
        assert_eq!(payload.comment.as_deref(), Some("meh"));
        assert_eq!(payload.contact_name, None);
        assert_eq!(payload.is_positive, Some(false));
    }

    /// A relay endpoint backed by one form with a single Telegram subscriber.
    async fn relay() -> (Client, String, Arc<RecordingChannel>) {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form.clone()));
        store.subscribe(&form, ChannelKind::Telegram, "1");

        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram));
        let notifier = SubscriberNotifier::new(store, "https://app.test", Duration::from_millis(200))
            .with_channel(channel.clone());

        let rocket = rocket::build()
            .manage(Arc::new(notifier))
            .manage(WebhookSecret(Some(SECRET.to_string())))
            .mount("/", routes![review_created]);
        let client = Client::tracked(rocket).await.unwrap();
        (client, form_id, channel)
    }

    fn event(form_id: &str, rating: i32) -> String {
        serde_json::json!({
            "record": { "id": "r1", "form_id": form_id, "rating": rating, "comment": "Lovely" }
        })
        .to_string()
    }

    async fn post(client: &Client, body: String, signature: &str) -> Status {
        client
            .post("/webhooks/review-created")
            .header(ContentType::JSON)
            .header(Header::new("X-Signature", signature.to_string()))
            .body(body)
            .dispatch()
            .await
            .status()
    }

    #[tokio::test]
    async fn signed_event_notifies_subscribers() {
        let (client, form_id, channel) = relay().await;
        let body = event(&form_id, 5);
        let signature = signature::sign(SECRET, body.as_bytes()).unwrap();

        assert_eq!(post(&client, body, &signature).await, Status::Ok);
        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("(5/5)"));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let (client, form_id, channel) = relay().await;
        let body = event(&form_id, 5);
        let forged = signature::sign("someone-else", body.as_bytes()).unwrap();

        assert_eq!(post(&client, body, &forged).await, Status::Unauthorized);

        let response = client
            .post("/webhooks/review-created")
            .header(ContentType::JSON)
            .body(event(&form_id, 5))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_without_dispatch() {
        let (client, form_id, channel) = relay().await;
        let body = event(&form_id, 9);
        let signature = signature::sign(SECRET, body.as_bytes()).unwrap();

        assert_eq!(post(&client, body, &signature).await, Status::BadRequest);
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_form_is_not_found() {
        let (client, _, channel) = relay().await;
        let body = event("65f1c0ffee0000000000beef", 4);
        let signature = signature::sign(SECRET, body.as_bytes()).unwrap();

        assert_eq!(post(&client, body, &signature).await, Status::NotFound);
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 0);
    }
}
