use thiserror::Error;

/// Failure classes for the processing pipeline.
///
/// Each component maps faults to one of these, and the policy per variant is
/// fixed: `Transient` faults from the classifier and the pairwise judge are
/// absorbed into safe defaults before they reach the caller, while embedding
/// and storage faults propagate so the event is redelivered and retried.
/// `Validation` marks events that can never succeed and are dropped instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient fault: {0}")]
    Transient(String),

    #[error("parse fault: {0}")]
    Parse(String),

    #[error("validation fault: {0}")]
    Validation(String),

    #[error("storage fault: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse(err.to_string())
    }
}
