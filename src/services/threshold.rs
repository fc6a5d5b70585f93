use serde::Serialize;
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::error::PipelineError;
use crate::models::Form;

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct RedirectDecision {
    pub is_positive: bool,
    pub redirect_target: String,
}

pub fn validate_rating(rating: i32) -> Result<(), PipelineError> {
    if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        return Err(PipelineError::invalid(format!(
            "Rating must be between {} and {}",
            RATING_MIN, RATING_MAX
        )));
    }
    Ok(())
}

/// A rating equal to the threshold counts as positive.
pub fn evaluate(
    rating: i32,
    threshold: i32,
    positive_redirect: &str,
    negative_redirect: &str,
) -> Result<RedirectDecision, PipelineError> {
    validate_rating(rating)?;
    if threshold <= 0 {
        return Err(PipelineError::invalid("Threshold must be positive"));
    }

    let is_positive = rating >= threshold;
    let redirect_target = if is_positive {
        positive_redirect
    } else {
        negative_redirect
    };

    Ok(RedirectDecision {
        is_positive,
        redirect_target: redirect_target.to_string(),
    })
}

/// Evaluates against the form's current threshold and redirect rules.
pub fn evaluate_for_form(form: &Form, rating: i32) -> Result<RedirectDecision, PipelineError> {
    evaluate(
        rating,
        form.threshold,
        &form.positive_redirect_url,
        &form.negative_target(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_form, NegativeRedirectType};

    #[test]
    fn positive_iff_rating_reaches_threshold() {
        for threshold in 1..=5 {
            for rating in RATING_MIN..=RATING_MAX {
                let decision = evaluate(rating, threshold, "/yes", "/no").unwrap();
                assert_eq!(decision.is_positive, rating >= threshold);
                let expected = if rating >= threshold { "/yes" } else { "/no" };
                assert_eq!(decision.redirect_target, expected);
            }
        }
    }

    #[test]
    fn boundary_rating_is_positive() {
        let decision = evaluate(4, 4, "/thanks", "/feedback").unwrap();
        assert_eq!(
            decision,
            RedirectDecision {
                is_positive: true,
                redirect_target: "/thanks".to_string()
            }
        );

        let decision = evaluate(3, 4, "/thanks", "/feedback").unwrap();
        assert!(!decision.is_positive);
        assert_eq!(decision.redirect_target, "/feedback");
    }

    #[test]
    fn rejects_out_of_range_rating() {
        for rating in [0, 6, -1, i32::MAX] {
            assert!(matches!(
                evaluate(rating, 3, "/a", "/b"),
                Err(PipelineError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn rejects_non_positive_threshold() {
        for threshold in [0, -3] {
            assert!(matches!(
                evaluate(3, threshold, "/a", "/b"),
                Err(PipelineError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn threshold_above_scale_makes_everything_negative() {
        let decision = evaluate(5, 6, "/a", "/b").unwrap();
        assert!(!decision.is_positive);
    }

    #[test]
    fn form_with_internal_negative_page() {
        let mut form = sample_form(4);
        form.negative_redirect_type = NegativeRedirectType::Internal;

        let decision = evaluate_for_form(&form, 2).unwrap();
        assert_eq!(decision.redirect_target, "/f/corner-cafe/feedback");
    }
}
