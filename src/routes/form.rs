use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::{is_duplicate_key, DbConn, FORMS, REVIEWS, SUBSCRIBERS};
use crate::guards::AuthGuard;
use crate::models::{CreateFormDto, Form, FormResponse, NegativeRedirectType, UpdateFormDto};
use crate::services::FormCache;
use crate::services::threshold::{RATING_MAX, RATING_MIN};
use crate::utils::{validate_redirect_url, validate_slug, ApiError, ApiResponse};

const MAX_NAME_CHARS: usize = 120;
const MAX_MESSAGE_CHARS: usize = 1000;
const MAX_QUESTIONS: usize = 10;
const MAX_QUESTION_CHARS: usize = 200;

/// Loads a form only if it belongs to the caller.
pub(crate) async fn load_owned_form(
    db: &DbConn,
    form_id: &str,
    company_id: ObjectId,
) -> Result<Form, ApiError> {
    let object_id = ObjectId::parse_str(form_id)
        .map_err(|_| ApiError::bad_request("Invalid form ID"))?;

    db.collection::<Form>(FORMS)
        .find_one(doc! { "_id": object_id, "company_id": company_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Form not found"))
}

fn validate_form(form: &Form) -> Result<(), ApiError> {
    if !validate_slug(&form.slug) {
        return Err(ApiError::bad_request(
            "Slug must be 3-64 characters of lowercase letters, digits and dashes",
        ));
    }
    if form.name.trim().is_empty() || form.name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::bad_request("Name is required (max 120 characters)"));
    }
    for message in [&form.welcome_message, &form.thank_you_message].into_iter().flatten() {
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ApiError::bad_request("Messages must be at most 1000 characters"));
        }
    }
    if !(RATING_MIN..=RATING_MAX).contains(&form.threshold) {
        return Err(ApiError::bad_request(format!(
            "Threshold must be between {} and {}",
            RATING_MIN, RATING_MAX
        )));
    }
    if !validate_redirect_url(&form.positive_redirect_url) {
        return Err(ApiError::bad_request("Invalid positive redirect URL"));
    }
    match (&form.negative_redirect_type, &form.negative_redirect_url) {
        (NegativeRedirectType::External, None) => {
            return Err(ApiError::bad_request("External negative redirect needs a URL"));
        }
        (_, Some(url)) if !validate_redirect_url(url) => {
            return Err(ApiError::bad_request("Invalid negative redirect URL"));
        }
        _ => {}
    }
    if form.negative_questions.len() > MAX_QUESTIONS {
        return Err(ApiError::bad_request("At most 10 follow-up questions"));
    }
    if form
        .negative_questions
        .iter()
        .any(|q| q.trim().is_empty() || q.chars().count() > MAX_QUESTION_CHARS)
    {
        return Err(ApiError::bad_request("Follow-up questions must be 1-200 characters"));
    }
    Ok(())
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[openapi(tag = "Form")]
#[post("/forms", data = "<dto>")]
pub async fn create_form(
    db: &State<DbConn>,
    cache: &State<FormCache>,
    auth: AuthGuard,
    dto: Json<CreateFormDto>,
) -> Result<Json<ApiResponse<FormResponse>>, ApiError> {
    let dto = dto.into_inner();
    let negative_redirect_url = clean(dto.negative_redirect_url);
    let negative_redirect_type = dto.negative_redirect_type.unwrap_or(
        if negative_redirect_url.is_some() {
            NegativeRedirectType::External
        } else {
            NegativeRedirectType::Internal
        },
    );

    let now = DateTime::now();
    let mut form = Form {
        id: None,
        company_id: auth.company_id,
        slug: dto.slug.trim().to_lowercase(),
        name: dto.name.trim().to_string(),
        welcome_message: clean(dto.welcome_message),
        thank_you_message: clean(dto.thank_you_message),
        threshold: dto.threshold,
        positive_redirect_url: dto.positive_redirect_url.trim().to_string(),
        negative_redirect_url,
        negative_redirect_type,
        negative_questions: dto.negative_questions.unwrap_or_default(),
        comments_enabled: dto.comments_enabled.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    validate_form(&form)?;

    let existing = db
        .collection::<Form>(FORMS)
        .find_one(doc! { "slug": form.slug.as_str() }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;
    if existing.is_some() {
        return Err(ApiError::conflict("This link is already taken"));
    }

    let result = db
        .collection::<Form>(FORMS)
        .insert_one(&form, None)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                ApiError::conflict("This link is already taken")
            } else {
                ApiError::internal_error(format!("Failed to create form: {}", e))
            }
        })?;
    form.id = result.inserted_id.as_object_id();

    cache.invalidate(&auth.company_id);
    info!(
        "Form {} ({}) created by {}",
        form.id_hex(),
        form.slug,
        auth.email.as_deref().unwrap_or("unknown")
    );

    Ok(Json(ApiResponse::success_with_message(
        "Form created successfully".to_string(),
        FormResponse::from(form),
    )))
}

#[openapi(tag = "Form")]
#[get("/forms")]
pub async fn list_forms(
    db: &State<DbConn>,
    cache: &State<FormCache>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<FormResponse>>>, ApiError> {
    if let Some(forms) = cache.get(&auth.company_id) {
        return Ok(Json(ApiResponse::success(forms)));
    }

    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();

    let forms: Vec<Form> = db
        .collection::<Form>(FORMS)
        .find(doc! { "company_id": auth.company_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let forms: Vec<FormResponse> = forms.into_iter().map(FormResponse::from).collect();
    cache.put(auth.company_id, forms.clone());

    Ok(Json(ApiResponse::success(forms)))
}

#[openapi(tag = "Form")]
#[get("/forms/<form_id>")]
pub async fn get_form(
    db: &State<DbConn>,
    auth: AuthGuard,
    form_id: String,
) -> Result<Json<ApiResponse<FormResponse>>, ApiError> {
    let form = load_owned_form(db, &form_id, auth.company_id).await?;
    Ok(Json(ApiResponse::success(FormResponse::from(form))))
}

/// Threshold changes apply to future submissions only.
#[openapi(tag = "Form")]
#[put("/forms/<form_id>", data = "<dto>")]
pub async fn update_form(
    db: &State<DbConn>,
    cache: &State<FormCache>,
    auth: AuthGuard,
    form_id: String,
    dto: Json<UpdateFormDto>,
) -> Result<Json<ApiResponse<FormResponse>>, ApiError> {
    let mut form = load_owned_form(db, &form_id, auth.company_id).await?;
    let dto = dto.into_inner();

    if let Some(name) = dto.name {
        form.name = name.trim().to_string();
    }
    if dto.welcome_message.is_some() {
        form.welcome_message = clean(dto.welcome_message);
    }
    if dto.thank_you_message.is_some() {
        form.thank_you_message = clean(dto.thank_you_message);
    }
    if let Some(threshold) = dto.threshold {
        form.threshold = threshold;
    }
    if let Some(url) = dto.positive_redirect_url {
        form.positive_redirect_url = url.trim().to_string();
    }
    if dto.negative_redirect_url.is_some() {
        form.negative_redirect_url = clean(dto.negative_redirect_url);
    }
    if let Some(kind) = dto.negative_redirect_type {
        form.negative_redirect_type = kind;
    }
    if let Some(questions) = dto.negative_questions {
        form.negative_questions = questions;
    }
    if let Some(enabled) = dto.comments_enabled {
        form.comments_enabled = enabled;
    }
    form.updated_at = DateTime::now();
    validate_form(&form)?;

    db.collection::<Form>(FORMS)
        .replace_one(doc! { "_id": form.id, "company_id": auth.company_id }, &form, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update form: {}", e)))?;

    cache.invalidate(&auth.company_id);

    Ok(Json(ApiResponse::success_with_message(
        "Form updated successfully".to_string(),
        FormResponse::from(form),
    )))
}

#[openapi(tag = "Form")]
#[delete("/forms/<form_id>")]
pub async fn delete_form(
    db: &State<DbConn>,
    cache: &State<FormCache>,
    auth: AuthGuard,
    form_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let form = load_owned_form(db, &form_id, auth.company_id).await?;
    let object_id = form.id.ok_or_else(|| ApiError::internal_error("Invalid form ID"))?;

    let mut deleted = [0u64; 3];
    for (i, (collection, filter)) in cascade_filters(object_id).into_iter().enumerate() {
        let result = db
            .collection::<Document>(collection)
            .delete_many(filter, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to delete {}: {}", collection, e)))?;
        deleted[i] = result.deleted_count;
    }
    let [_, deleted_reviews, deleted_subscribers] = deleted;

    cache.invalidate(&auth.company_id);
    info!(
        "Form {} deleted with {} reviews and {} subscribers",
        form_id, deleted_reviews, deleted_subscribers
    );

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Form deleted successfully",
        "deleted_reviews": deleted_reviews,
        "deleted_subscribers": deleted_subscribers,
    }))))
}

/// Delete order for a form and everything hanging off it. The form goes
/// first so submissions still in flight stop resolving it.
fn cascade_filters(object_id: ObjectId) -> [(&'static str, Document); 3] {
    [
        (FORMS, doc! { "_id": object_id }),
        (REVIEWS, doc! { "form_id": object_id }),
        (SUBSCRIBERS, doc! { "form_id": object_id }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_form;

    #[test]
    fn accepts_sample_form() {
        assert!(validate_form(&sample_form(4)).is_ok());
    }

    #[test]
    fn rejects_bad_threshold_and_urls() {
        let mut form = sample_form(0);
        assert!(validate_form(&form).is_err());

        form.threshold = 6;
        assert!(validate_form(&form).is_err());

        form.threshold = 3;
        form.positive_redirect_url = "javascript:alert(1)".to_string();
        assert!(validate_form(&form).is_err());

        form.positive_redirect_url = "/thanks".to_string();
        form.negative_redirect_url = None;
        assert!(validate_form(&form).is_err());

        form.negative_redirect_type = NegativeRedirectType::Internal;
        assert!(validate_form(&form).is_ok());
    }

    #[test]
    fn rejects_blank_questions() {
        let mut form = sample_form(4);
        form.negative_questions = vec!["What went wrong?".to_string(), " ".to_string()];
        assert!(validate_form(&form).is_err());
    }

    #[test]
    fn cascade_removes_the_form_before_its_reviews() {
        let id = ObjectId::new();
        let filters = cascade_filters(id);
        let order: Vec<&str> = filters.iter().map(|(collection, _)| *collection).collect();

        assert_eq!(order, vec![FORMS, REVIEWS, SUBSCRIBERS]);
        assert_eq!(filters[0].1, doc! { "_id": id });
        assert_eq!(filters[1].1, doc! { "form_id": id });
    }
}
