use mongodb::bson::oid::ObjectId;

use crate::error::{DispatchError, StoreError};
use crate::models::{ChannelKind, Form, NewReview, Review, Subscriber};

/// Read access to forms and their subscribers.
#[rocket::async_trait]
pub trait FormStore: Send + Sync {
    /// `Ok(None)` when no form has this id.
    async fn get_form(&self, id: &str) -> Result<Option<Form>, StoreError>;

    async fn list_subscribers(&self, form_id: &str) -> Result<Vec<Subscriber>, StoreError>;
}

#[rocket::async_trait]
pub trait ReviewStore: Send + Sync {
    async fn create_review(&self, review: NewReview) -> Result<Review, StoreError>;
}

/// Subscription changes requested over a messaging channel.
#[rocket::async_trait]
pub trait SubscriberStore: Send + Sync {
    /// `Ok(false)` when the identity already follows the form.
    async fn add_subscriber(
        &self,
        form_id: ObjectId,
        channel: ChannelKind,
        identity: &str,
    ) -> Result<bool, StoreError>;

    /// `Ok(false)` when there was nothing to remove.
    async fn remove_subscriber(
        &self,
        form_id: &str,
        channel: ChannelKind,
        identity: &str,
    ) -> Result<bool, StoreError>;

    async fn remove_subscribers(&self, channel: ChannelKind, identity: &str) -> Result<u64, StoreError>;

    async fn list_for_identity(
        &self,
        channel: ChannelKind,
        identity: &str,
    ) -> Result<Vec<Subscriber>, StoreError>;
}

/// An outbound messaging integration (bot API, WhatsApp gateway).
#[rocket::async_trait]
pub trait MessagingChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send_message(&self, identity: &str, text: &str) -> Result<(), DispatchError>;
}
