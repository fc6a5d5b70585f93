use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::{is_duplicate_key, DbConn, SUBSCRIBERS};
use crate::guards::AuthGuard;
use crate::models::{ChannelKind, Subscriber, SubscriberResponse, WhatsappSubscribeDto};
use crate::routes::form::load_owned_form;
use crate::utils::{normalize_phone, validate_phone, ApiError, ApiResponse};

#[openapi(tag = "Subscriber")]
#[get("/forms/<form_id>/subscribers")]
pub async fn list_subscribers(
    db: &State<DbConn>,
    auth: AuthGuard,
    form_id: String,
) -> Result<Json<ApiResponse<Vec<SubscriberResponse>>>, ApiError> {
    let form = load_owned_form(db, &form_id, auth.company_id).await?;

    let subscribers: Vec<Subscriber> = db
        .collection::<Subscriber>(SUBSCRIBERS)
        .find(doc! { "form_id": form.id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    Ok(Json(ApiResponse::success(
        subscribers.into_iter().map(SubscriberResponse::from).collect(),
    )))
}

#[openapi(tag = "Subscriber")]
#[post("/forms/<form_id>/subscribers/whatsapp", data = "<dto>")]
pub async fn subscribe_whatsapp(
    db: &State<DbConn>,
    auth: AuthGuard,
    form_id: String,
    dto: Json<WhatsappSubscribeDto>,
) -> Result<Json<ApiResponse<SubscriberResponse>>, ApiError> {
    let form = load_owned_form(db, &form_id, auth.company_id).await?;
    let form_object_id = form.id.ok_or_else(|| ApiError::internal_error("Invalid form ID"))?;

    let phone = normalize_phone(&dto.phone);
    if !validate_phone(&phone) {
        return Err(ApiError::bad_request("Invalid phone number"));
    }

    let collection = db.collection::<Subscriber>(SUBSCRIBERS);
    let existing = collection
        .find_one(
            doc! {
                "form_id": form_object_id,
                "channel": ChannelKind::Whatsapp.as_str(),
                "identity": phone.as_str(),
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;
    if existing.is_some() {
        return Err(ApiError::conflict("This number is already subscribed"));
    }

    let mut subscriber = Subscriber {
        id: None,
        form_id: form_object_id,
        channel: ChannelKind::Whatsapp,
        identity: phone,
        created_at: DateTime::now(),
    };
    let result = collection
        .insert_one(&subscriber, None)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                ApiError::conflict("This number is already subscribed")
            } else {
                ApiError::internal_error(format!("Failed to subscribe: {}", e))
            }
        })?;
    subscriber.id = result.inserted_id.as_object_id();

    Ok(Json(ApiResponse::success_with_message(
        "WhatsApp notifications enabled".to_string(),
        SubscriberResponse::from(subscriber),
    )))
}

#[openapi(tag = "Subscriber")]
#[delete("/forms/<form_id>/subscribers/<subscriber_id>")]
pub async fn delete_subscriber(
    db: &State<DbConn>,
    auth: AuthGuard,
    form_id: String,
    subscriber_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let form = load_owned_form(db, &form_id, auth.company_id).await?;
    let object_id = ObjectId::parse_str(&subscriber_id)
        .map_err(|_| ApiError::bad_request("Invalid subscriber ID"))?;

    let result = db
        .collection::<Subscriber>(SUBSCRIBERS)
        .delete_one(doc! { "_id": object_id, "form_id": form.id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete subscriber: {}", e)))?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Subscriber not found"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Subscriber removed"
    }))))
}
