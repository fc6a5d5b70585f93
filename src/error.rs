use thiserror::Error;

use crate::utils::ApiError;

/// Failure reported by a storage collaborator.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        StoreError(format!("Database error: {}", e))
    }
}

/// Terminal rejection of a submission or notification request.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl PipelineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PipelineError::InvalidInput(message.into())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::InvalidInput(message) => ApiError::bad_request(message),
            PipelineError::FormNotFound(_) => ApiError::not_found("Form not found"),
            PipelineError::Persistence(e) => {
                log::error!("Storage failure: {}", e);
                ApiError::internal_error("Storage error, please try again later")
            }
        }
    }
}

/// A single subscriber dispatch that did not go through.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("dispatch timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rejected by channel: {0}")]
    Rejected(String),

    #[error("no {0} channel configured")]
    ChannelUnavailable(crate::models::ChannelKind),
}
