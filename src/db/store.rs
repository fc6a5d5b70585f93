use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use rocket::futures::TryStreamExt;

use crate::db::{is_duplicate_key, FORMS, REVIEWS, SUBSCRIBERS};
use crate::error::StoreError;
use crate::models::{ChannelKind, Form, NewReview, Review, Subscriber};
use crate::services::store::{FormStore, ReviewStore, SubscriberStore};

/// MongoDB-backed implementation of the pipeline's store traits.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        MongoStore { db }
    }
}

#[rocket::async_trait]
impl FormStore for MongoStore {
    async fn get_form(&self, id: &str) -> Result<Option<Form>, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        Ok(self
            .db
            .collection::<Form>(FORMS)
            .find_one(doc! { "_id": object_id }, None)
            .await?)
    }

    async fn list_subscribers(&self, form_id: &str) -> Result<Vec<Subscriber>, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(form_id) else {
            return Ok(Vec::new());
        };

        Ok(self
            .db
            .collection::<Subscriber>(SUBSCRIBERS)
            .find(doc! { "form_id": object_id }, None)
            .await?
            .try_collect()
            .await?)
    }
}

#[rocket::async_trait]
impl ReviewStore for MongoStore {
    async fn create_review(&self, review: NewReview) -> Result<Review, StoreError> {
        let mut review = review.into_review();

        let result = self
            .db
            .collection::<Review>(REVIEWS)
            .insert_one(&review, None)
            .await?;

        review.id = Some(
            result
                .inserted_id
                .as_object_id()
                .ok_or_else(|| StoreError("Invalid review ID".to_string()))?,
        );
        Ok(review)
    }
}

#[rocket::async_trait]
impl SubscriberStore for MongoStore {
    async fn add_subscriber(
        &self,
        form_id: ObjectId,
        channel: ChannelKind,
        identity: &str,
    ) -> Result<bool, StoreError> {
        let subscriber = Subscriber {
            id: None,
            form_id,
            channel,
            identity: identity.to_string(),
            created_at: DateTime::now(),
        };

        // the unique (form_id, channel, identity) index makes this idempotent
        match self
            .db
            .collection::<Subscriber>(SUBSCRIBERS)
            .insert_one(&subscriber, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_subscriber(
        &self,
        form_id: &str,
        channel: ChannelKind,
        identity: &str,
    ) -> Result<bool, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(form_id) else {
            return Ok(false);
        };

        let result = self
            .db
            .collection::<Subscriber>(SUBSCRIBERS)
            .delete_one(
                doc! { "form_id": object_id, "channel": channel.as_str(), "identity": identity },
                None,
            )
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn remove_subscribers(&self, channel: ChannelKind, identity: &str) -> Result<u64, StoreError> {
        let result = self
            .db
            .collection::<Subscriber>(SUBSCRIBERS)
            .delete_many(doc! { "channel": channel.as_str(), "identity": identity }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn list_for_identity(
        &self,
        channel: ChannelKind,
        identity: &str,
    ) -> Result<Vec<Subscriber>, StoreError> {
        Ok(self
            .db
            .collection::<Subscriber>(SUBSCRIBERS)
            .find(doc! { "channel": channel.as_str(), "identity": identity }, None)
            .await?
            .try_collect()
            .await?)
    }
}
