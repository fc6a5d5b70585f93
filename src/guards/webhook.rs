use log::warn;
use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::config::Config;

/// Hex HMAC signature of a relayed webhook body, checked in the handler
/// once the body has been read.
pub struct WebhookSignature(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for WebhookSignature {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.headers().get_one("X-Signature") {
            Some(signature) => Outcome::Success(WebhookSignature(signature.to_string())),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Telegram echoes the secret given to `setWebhook` in this header.
pub struct TelegramWebhookGuard;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TelegramWebhookGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(expected) = Config::telegram_webhook_secret() else {
            warn!("Telegram webhook secret not configured, rejecting update");
            return Outcome::Error((Status::ServiceUnavailable, ()));
        };

        match req.headers().get_one("X-Telegram-Bot-Api-Secret-Token") {
            Some(token) if token == expected => Outcome::Success(TelegramWebhookGuard),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for WebhookSignature {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

impl<'a> OpenApiFromRequest<'a> for TelegramWebhookGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
