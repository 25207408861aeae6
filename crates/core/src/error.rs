/// Domain error taxonomy shared by every crate in the workspace.
///
/// Errors raised before a job record exists are returned to the caller;
/// errors raised afterwards are recorded on the job instead.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid audio container: {0}")]
    Format(String),

    #[error("Unsupported audio compression: {0}")]
    UnsupportedCompression(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The job exists (or may exist remotely) but has no output yet.
    ///
    /// The "output not available yet" flavour of not-found; see
    /// [`CoreError::is_not_found`].
    #[doc(alias = "NotFoundError")]
    #[error("Output not available yet for job {0}")]
    OutputNotReady(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Shorthand for a missing job.
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Job",
            id: id.into(),
        }
    }

    /// Whether this is a not-found condition, including an output that is
    /// not available yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::OutputNotReady(_))
    }
}
