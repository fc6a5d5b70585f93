use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Contacted,
    Resolved,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::Contacted => "contacted",
            ContactStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.email, &self.phone]
            .iter()
            .all(|field| field.as_deref().map(str::trim).unwrap_or("").is_empty())
    }
}

/// Answer to one of the form's negative follow-up questions.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct FeedbackAnswer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub form_id: ObjectId,
    pub rating: i32, // 1-5
    pub comment: Option<String>,
    #[serde(default)]
    pub feedback: Vec<FeedbackAnswer>,
    pub contact: Option<ContactInfo>,
    pub contact_status: Option<ContactStatus>,
    pub is_positive: bool,
    pub created_at: DateTime,
}

/// A validated review ready to be written.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub form_id: ObjectId,
    pub rating: i32,
    pub comment: Option<String>,
    pub feedback: Vec<FeedbackAnswer>,
    pub contact: Option<ContactInfo>,
    pub is_positive: bool,
}

impl NewReview {
    pub fn into_review(self) -> Review {
        let contact_status = self.contact.as_ref().map(|_| ContactStatus::Pending);
        Review {
            id: None,
            form_id: self.form_id,
            rating: self.rating,
            comment: self.comment,
            feedback: self.feedback,
            contact: self.contact,
            contact_status,
            is_positive: self.is_positive,
            created_at: DateTime::now(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema, Clone, Default)]
pub struct ReviewSubmission {
    pub rating: i32,
    pub comment: Option<String>,
    pub contact: Option<ContactInfo>,
    pub feedback: Option<Vec<FeedbackAnswer>>,
}

/// Review data carried into a notification.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ReviewPayload {
    pub review_id: Option<String>,
    pub rating: i32,
    pub comment: Option<String>,
    pub contact_name: Option<String>,
    pub is_positive: Option<bool>,
}

impl From<&Review> for ReviewPayload {
    fn from(review: &Review) -> Self {
        ReviewPayload {
            review_id: review.id.map(|id| id.to_hex()),
            rating: review.rating,
            comment: review.comment.clone(),
            contact_name: review.contact.as_ref().and_then(|c| c.name.clone()),
            is_positive: Some(review.is_positive),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateContactStatusDto {
    pub status: ContactStatus,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewResponse {
    pub id: String,
    pub form_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub feedback: Vec<FeedbackAnswer>,
    pub contact: Option<ContactInfo>,
    pub contact_status: Option<ContactStatus>,
    pub is_positive: bool,
    pub created_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        ReviewResponse {
            id: review.id.map(|id| id.to_hex()).unwrap_or_default(),
            form_id: review.form_id.to_hex(),
            rating: review.rating,
            comment: review.comment,
            feedback: review.feedback,
            contact: review.contact,
            contact_status: review.contact_status,
            is_positive: review.is_positive,
            created_at: review.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
