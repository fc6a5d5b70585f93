use std::sync::Arc;

use log::info;

use crate::error::{PipelineError, StoreError};
use crate::models::{ContactInfo, FeedbackAnswer, Form, NewReview, ReviewPayload, ReviewSubmission};
use crate::services::queue::NotificationQueue;
use crate::services::store::{FormStore, ReviewStore};
use crate::services::threshold::{self, RedirectDecision};
use crate::utils::{normalize_phone, validate_email, validate_phone};

const MAX_COMMENT_CHARS: usize = 2000;
const MAX_FEEDBACK_ANSWERS: usize = 20;
const MAX_FIELD_CHARS: usize = 200;

/// Validates, stores and classifies a submitted review, then schedules the
/// subscriber notification in the background.
pub struct SubmissionService {
    forms: Arc<dyn FormStore>,
    reviews: Arc<dyn ReviewStore>,
    queue: NotificationQueue,
}

impl SubmissionService {
    pub fn new(forms: Arc<dyn FormStore>, reviews: Arc<dyn ReviewStore>, queue: NotificationQueue) -> Self {
        SubmissionService { forms, reviews, queue }
    }

    pub async fn submit(
        &self,
        form_id: &str,
        submission: ReviewSubmission,
    ) -> Result<RedirectDecision, PipelineError> {
        let form = self
            .forms
            .get_form(form_id)
            .await?
            .ok_or_else(|| PipelineError::FormNotFound(form_id.to_string()))?;

        let review = validate(&form, submission)?;
        let decision = threshold::evaluate_for_form(&form, review.rating)?;

        let review = self
            .reviews
            .create_review(NewReview {
                is_positive: decision.is_positive,
                ..review
            })
            .await?;

        let job = self.queue.enqueue(form_id.to_string(), ReviewPayload::from(&review));
        info!(
            "Review {} saved for form {} (rating {}, positive {}), notification job {}",
            review.id.map(|id| id.to_hex()).unwrap_or_default(),
            form_id,
            review.rating,
            decision.is_positive,
            job
        );

        Ok(decision)
    }
}

fn validate(form: &Form, submission: ReviewSubmission) -> Result<NewReview, PipelineError> {
    threshold::validate_rating(submission.rating)?;

    let form_id = form
        .id
        .ok_or_else(|| StoreError("Form record has no id".to_string()))?;

    let comment = if form.comments_enabled {
        trimmed(submission.comment)
    } else {
        None
    };
    if let Some(comment) = &comment {
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(PipelineError::invalid(format!(
                "Comment must be at most {} characters",
                MAX_COMMENT_CHARS
            )));
        }
    }

    let feedback = submission.feedback.unwrap_or_default();
    if feedback.len() > MAX_FEEDBACK_ANSWERS {
        return Err(PipelineError::invalid("Too many feedback answers"));
    }
    let feedback: Vec<FeedbackAnswer> = feedback
        .into_iter()
        .filter(|f| !f.answer.trim().is_empty())
        .map(|f| FeedbackAnswer {
            question: f.question.trim().to_string(),
            answer: f.answer.trim().to_string(),
        })
        .collect();
    if feedback
        .iter()
        .any(|f| f.answer.chars().count() > MAX_COMMENT_CHARS || f.question.chars().count() > MAX_FIELD_CHARS)
    {
        return Err(PipelineError::invalid("Feedback answer too long"));
    }

    let contact = submission.contact.map(validate_contact).transpose()?.flatten();

    Ok(NewReview {
        form_id,
        rating: submission.rating,
        comment,
        feedback,
        contact,
        is_positive: false,
    })
}

fn validate_contact(contact: ContactInfo) -> Result<Option<ContactInfo>, PipelineError> {
    let contact = ContactInfo {
        name: trimmed(contact.name),
        email: trimmed(contact.email),
        phone: trimmed(contact.phone).map(|p| normalize_phone(&p)),
    };
    if contact.is_empty() {
        return Ok(None);
    }

    if contact.name.as_ref().is_some_and(|n| n.chars().count() > MAX_FIELD_CHARS) {
        return Err(PipelineError::invalid("Contact name too long"));
    }
    if let Some(email) = &contact.email {
        if !validate_email(email) {
            return Err(PipelineError::invalid("Invalid contact email"));
        }
    }
    if let Some(phone) = &contact.phone {
        if !validate_phone(phone) {
            return Err(PipelineError::invalid("Invalid contact phone"));
        }
    }
    Ok(Some(contact))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_form, ChannelKind};
    use crate::services::notifier::{DeliveryCounts, SubscriberNotifier};
    use crate::services::store::memory::{MemoryStore, RecordingChannel};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;

    use crate::services::queue::NotificationJob;

    fn service(store: Arc<MemoryStore>) -> (SubmissionService, Receiver<NotificationJob>) {
        let (queue, rx) = NotificationQueue::channel(16);
        (SubmissionService::new(store.clone(), store, queue), rx)
    }

    fn rating(rating: i32, comment: Option<&str>) -> ReviewSubmission {
        ReviewSubmission {
            rating,
            comment: comment.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn redirects_by_threshold() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form));
        let (service, _rx) = service(store.clone());

        let decision = service.submit(&form_id, rating(4, None)).await.unwrap();
        assert_eq!(
            decision,
            RedirectDecision { is_positive: true, redirect_target: "/thanks".to_string() }
        );

        let decision = service.submit(&form_id, rating(3, None)).await.unwrap();
        assert_eq!(
            decision,
            RedirectDecision { is_positive: false, redirect_target: "/feedback".to_string() }
        );

        let stored = store.reviews.lock().unwrap();
        assert_eq!(stored.iter().map(|r| r.is_positive).collect::<Vec<_>>(), vec![true, false]);
    }

    #[tokio::test]
    async fn unknown_form_is_not_persisted() {
        let store = Arc::new(MemoryStore::default());
        let (service, mut rx) = service(store.clone());

        let result = service.submit("nope", rating(5, None)).await;
        assert!(matches!(result, Err(PipelineError::FormNotFound(_))));
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_rating_is_rejected_without_side_effects() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form));
        let (service, mut rx) = service(store.clone());

        for bad in [0, 6] {
            let result = service.submit(&form_id, rating(bad, None)).await;
            assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        }
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn persistence_failure_schedules_no_notification() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore {
            fail_writes: true,
            ..MemoryStore::with_form(form)
        });
        let (service, mut rx) = service(store.clone());

        let result = service.submit(&form_id, rating(5, Some("nice"))).await;
        assert!(matches!(result, Err(PipelineError::Persistence(_))));
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn comments_dropped_when_form_disables_them() {
        let mut form = sample_form(4);
        form.comments_enabled = false;
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form));
        let (service, _rx) = service(store.clone());

        service.submit(&form_id, rating(5, Some("hello"))).await.unwrap();
        assert_eq!(store.reviews.lock().unwrap()[0].comment, None);
    }

    #[tokio::test]
    async fn contact_details_are_validated() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form));
        let (service, _rx) = service(store.clone());

        let bad = ReviewSubmission {
            contact: Some(ContactInfo {
                email: Some("not-an-email".to_string()),
                ..Default::default()
            }),
            ..rating(2, None)
        };
        assert!(matches!(
            service.submit(&form_id, bad).await,
            Err(PipelineError::InvalidInput(_))
        ));

        let good = ReviewSubmission {
            contact: Some(ContactInfo {
                name: Some(" Ana ".to_string()),
                email: None,
                phone: Some("+91 98765 43210".to_string()),
            }),
            ..rating(2, None)
        };
        service.submit(&form_id, good).await.unwrap();
        let reviews = store.reviews.lock().unwrap();
        let contact = reviews[0].contact.clone().unwrap();
        assert_eq!(contact.name.as_deref(), Some("Ana"));
        assert_eq!(contact.phone.as_deref(), Some("+919876543210"));
        assert!(reviews[0].contact_status.is_some());
    }

    #[tokio::test]
    async fn blank_contact_is_dropped() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form));
        let (service, _rx) = service(store.clone());

        let submission = ReviewSubmission {
            contact: Some(ContactInfo { name: Some("  ".to_string()), ..Default::default() }),
            ..rating(5, None)
        };
        service.submit(&form_id, submission).await.unwrap();
        let reviews = store.reviews.lock().unwrap();
        assert!(reviews[0].contact.is_none());
        assert!(reviews[0].contact_status.is_none());
    }

    #[tokio::test]
    async fn each_subscriber_gets_one_message_with_the_review() {
        let form = sample_form(4);
        let form_id = form.id_hex();
        let store = Arc::new(MemoryStore::with_form(form.clone()));
        store.subscribe(&form, ChannelKind::Telegram, "111");
        store.subscribe(&form, ChannelKind::Telegram, "222");
        let channel = Arc::new(RecordingChannel::new(ChannelKind::Telegram));
        let notifier = SubscriberNotifier::new(store.clone(), "https://app.test", Duration::from_secs(1))
            .with_channel(channel.clone());
        let (service, mut rx) = service(store);

        service
            .submit(&form_id, rating(2, Some("Waited forty minutes")))
            .await
            .unwrap();

        let job = rx.try_recv().unwrap();
        assert_eq!(job.form_id, form_id);
        let outcome = notifier.notify(&job.form_id, &job.review).await.unwrap();

        assert_eq!(outcome.total, DeliveryCounts { attempted: 2, delivered: 2, failed: 0 });
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 2);
        let sent = channel.sent.lock().unwrap();
        for (_, text) in sent.iter() {
            assert!(text.contains("(2/5)"));
            assert!(text.contains("Waited forty minutes"));
        }
        assert!(rx.try_recv().is_err());
    }
}
