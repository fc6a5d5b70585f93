use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NegativeRedirectType {
    /// Built-in feedback page hosted by the frontend.
    Internal,
    External,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Form {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub company_id: ObjectId,
    pub slug: String,
    pub name: String,
    pub welcome_message: Option<String>,
    pub thank_you_message: Option<String>,
    pub threshold: i32, // minimum positive rating
    pub positive_redirect_url: String,
    pub negative_redirect_url: Option<String>,
    pub negative_redirect_type: NegativeRedirectType,
    #[serde(default)]
    pub negative_questions: Vec<String>,
    pub comments_enabled: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Form {
    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn internal_feedback_path(&self) -> String {
        format!("/f/{}/feedback", self.slug)
    }

    /// Where a negative submission is sent.
    pub fn negative_target(&self) -> String {
        match self.negative_redirect_type {
            NegativeRedirectType::Internal => self.internal_feedback_path(),
            NegativeRedirectType::External => self
                .negative_redirect_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| self.internal_feedback_path()),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateFormDto {
    pub slug: String,
    pub name: String,
    pub welcome_message: Option<String>,
    pub thank_you_message: Option<String>,
    pub threshold: i32,
    pub positive_redirect_url: String,
    pub negative_redirect_url: Option<String>,
    pub negative_redirect_type: Option<NegativeRedirectType>,
    pub negative_questions: Option<Vec<String>>,
    pub comments_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateFormDto {
    pub name: Option<String>,
    pub welcome_message: Option<String>,
    pub thank_you_message: Option<String>,
    pub threshold: Option<i32>,
    pub positive_redirect_url: Option<String>,
    pub negative_redirect_url: Option<String>,
    pub negative_redirect_type: Option<NegativeRedirectType>,
    pub negative_questions: Option<Vec<String>>,
    pub comments_enabled: Option<bool>,
}

#[derive(Debug, Serialize, Clone, JsonSchema)]
pub struct FormResponse {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub welcome_message: Option<String>,
    pub thank_you_message: Option<String>,
    pub threshold: i32,
    pub positive_redirect_url: String,
    pub negative_redirect_url: Option<String>,
    pub negative_redirect_type: NegativeRedirectType,
    pub negative_questions: Vec<String>,
    pub comments_enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Form> for FormResponse {
    fn from(form: Form) -> Self {
        FormResponse {
            id: form.id_hex(),
            slug: form.slug,
            name: form.name,
            welcome_message: form.welcome_message,
            thank_you_message: form.thank_you_message,
            threshold: form.threshold,
            positive_redirect_url: form.positive_redirect_url,
            negative_redirect_url: form.negative_redirect_url,
            negative_redirect_type: form.negative_redirect_type,
            negative_questions: form.negative_questions,
            comments_enabled: form.comments_enabled,
            created_at: form.created_at.try_to_rfc3339_string().unwrap_or_default(),
            updated_at: form.updated_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

/// What an anonymous customer sees before rating.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PublicFormResponse {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub welcome_message: Option<String>,
    pub thank_you_message: Option<String>,
    pub comments_enabled: bool,
    pub negative_questions: Vec<String>,
}

impl From<Form> for PublicFormResponse {
    fn from(form: Form) -> Self {
        PublicFormResponse {
            id: form.id_hex(),
            slug: form.slug,
            name: form.name,
            welcome_message: form.welcome_message,
            thank_you_message: form.thank_you_message,
            comments_enabled: form.comments_enabled,
            negative_questions: form.negative_questions,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_form(threshold: i32) -> Form {
    Form {
        id: Some(ObjectId::new()),
        company_id: ObjectId::new(),
        slug: "corner-cafe".to_string(),
        name: "Corner Cafe".to_string(),
        welcome_message: None,
        thank_you_message: None,
        threshold,
        positive_redirect_url: "/thanks".to_string(),
        negative_redirect_url: Some("/feedback".to_string()),
        negative_redirect_type: NegativeRedirectType::External,
        negative_questions: Vec::new(),
        comments_enabled: true,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_redirect_points_at_feedback_page() {
        let mut form = sample_form(4);
        form.negative_redirect_type = NegativeRedirectType::Internal;
        assert_eq!(form.negative_target(), "/f/corner-cafe/feedback");
    }

    #[test]
    fn external_redirect_without_url_falls_back_to_internal_page() {
        let mut form = sample_form(4);
        form.negative_redirect_url = Some("  ".to_string());
        assert_eq!(form.negative_target(), "/f/corner-cafe/feedback");

        form.negative_redirect_url = Some("https://example.com/sorry".to_string());
        assert_eq!(form.negative_target(), "https://example.com/sorry");
    }
}
