use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;
use crate::db::{DbConn, REVIEWS};
use crate::models::{Review, ReviewResponse, UpdateContactStatusDto};
use crate::guards::AuthGuard;
use crate::routes::form::load_owned_form;
use crate::services::stats::ReviewStats;
use crate::utils::{ApiResponse, ApiError};
use rocket::futures::TryStreamExt;

const MAX_PAGE: i64 = 10_000;
const MAX_LIMIT: i64 = 100;

/// Clamped page, page size and documents to skip.
fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, u64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    let limit = limit.unwrap_or(20).clamp(1, MAX_LIMIT);
    (page, limit, ((page - 1) * limit) as u64)
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct FormReviewsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// `positive` or `negative`
    pub sentiment: Option<String>,
}

#[openapi(tag = "Review")]
#[get("/forms/<form_id>/reviews?<query..>")]
pub async fn get_form_reviews(
    db: &State<DbConn>,
    auth: AuthGuard,
    form_id: String,
    query: FormReviewsQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let form = load_owned_form(db, &form_id, auth.company_id).await?;

    let (page, limit, skip) = page_window(query.page, query.limit);

    let mut filter = doc! { "form_id": form.id };
    match query.sentiment.as_deref() {
        Some("positive") => {
            filter.insert("is_positive", true);
        }
        Some("negative") => {
            filter.insert("is_positive", false);
        }
        Some(_) => return Err(ApiError::bad_request("Sentiment must be 'positive' or 'negative'")),
        None => {}
    }

    let find_options = FindOptions::builder()
        .skip(skip)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let mut cursor = db.collection::<Review>(REVIEWS)
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut reviews = Vec::new();
    while cursor.advance().await.map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))? {
        let review = cursor.deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        reviews.push(ReviewResponse::from(review));
    }

    let total = db.collection::<Review>(REVIEWS)
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "reviews": reviews,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Review")]
#[patch("/reviews/<review_id>/contact-status", data = "<dto>")]
pub async fn update_contact_status(
    db: &State<DbConn>,
    auth: AuthGuard,
    review_id: String,
    dto: Json<UpdateContactStatusDto>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let object_id = ObjectId::parse_str(&review_id)
        .map_err(|_| ApiError::bad_request("Invalid review ID"))?;

    let mut review = db.collection::<Review>(REVIEWS)
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    // Verify ownership through the parent form
    load_owned_form(db, &review.form_id.to_hex(), auth.company_id)
        .await
        .map_err(|_| ApiError::not_found("Review not found"))?;

    if review.contact.is_none() {
        return Err(ApiError::bad_request("Review has no contact details"));
    }

    db.collection::<Review>(REVIEWS)
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "contact_status": dto.status.as_str() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update review: {}", e)))?;

    review.contact_status = Some(dto.status);
    Ok(Json(ApiResponse::success(ReviewResponse::from(review))))
}

#[openapi(tag = "Review")]
#[get("/forms/<form_id>/stats")]
pub async fn get_form_stats(
    db: &State<DbConn>,
    auth: AuthGuard,
    form_id: String,
) -> Result<Json<ApiResponse<ReviewStats>>, ApiError> {
    let form = load_owned_form(db, &form_id, auth.company_id).await?;

    let reviews: Vec<Review> = db.collection::<Review>(REVIEWS)
        .find(doc! { "form_id": form.id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    Ok(Json(ApiResponse::success(ReviewStats::from_reviews(&reviews))))
}
