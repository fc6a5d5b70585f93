use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use crate::models::Review;
use crate::services::threshold::{RATING_MAX, RATING_MIN};

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ReviewStats {
    pub total: u64,
    pub average_rating: f64,
    pub positive: u64,
    pub negative: u64,
    /// Index 0 holds one-star reviews.
    pub distribution: [u64; 5],
    pub with_contact: u64,
}

impl ReviewStats {
    pub fn from_reviews<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        let mut stats = ReviewStats {
            total: 0,
            average_rating: 0.0,
            positive: 0,
            negative: 0,
            distribution: [0; 5],
            with_contact: 0,
        };
        let mut sum: i64 = 0;

        for review in reviews {
            stats.total += 1;
            sum += review.rating as i64;
            if review.is_positive {
                stats.positive += 1;
            } else {
                stats.negative += 1;
            }
            if (RATING_MIN..=RATING_MAX).contains(&review.rating) {
                stats.distribution[(review.rating - RATING_MIN) as usize] += 1;
            }
            if review.contact.as_ref().is_some_and(|c| !c.is_empty()) {
                stats.with_contact += 1;
            }
        }

        if stats.total > 0 {
            let average = sum as f64 / stats.total as f64;
            stats.average_rating = (average * 100.0).round() / 100.0;
        }
        stats
    }
}
