use lipsync_core::error::CoreError;
use lipsync_core::job::TransitionError;

/// Errors from [`JobStore`](crate::JobStore) mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::job_not_found(id),
            StoreError::Transition(e) => CoreError::Validation(e.to_string()),
        }
    }
}
