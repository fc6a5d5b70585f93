use std::sync::Arc;

use mongodb::bson::doc;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::{DbConn, FORMS};
use crate::models::{Form, PublicFormResponse, ReviewSubmission};
use crate::services::{RedirectDecision, SubmissionService};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Public")]
#[get("/public/forms/<slug>")]
pub async fn get_public_form(
    db: &State<DbConn>,
    slug: String,
) -> Result<Json<ApiResponse<PublicFormResponse>>, ApiError> {
    let form = db
        .collection::<Form>(FORMS)
        .find_one(doc! { "slug": slug.to_lowercase() }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Form not found"))?;

    Ok(Json(ApiResponse::success(PublicFormResponse::from(form))))
}

/// Stores the review and tells the client where to go next. Subscribers are
/// notified in the background.
#[openapi(tag = "Public")]
#[post("/public/forms/<form_id>/reviews", data = "<dto>")]
pub async fn submit_review(
    submissions: &State<Arc<SubmissionService>>,
    form_id: String,
    dto: Json<ReviewSubmission>,
) -> Result<Json<ApiResponse<RedirectDecision>>, ApiError> {
    let decision = submissions.submit(&form_id, dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Thank you for your feedback".to_string(),
        decision,
    )))
}
