use crate::job::JobStatus;
use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: JobId },

    #[error("Cannot {action} job {id} in status {from}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        action: &'static str,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("External task error: {0}")]
    ExternalTask(String),
}

impl CoreError {
    /// Shorthand for a missing job record.
    pub fn job_not_found(id: JobId) -> Self {
        Self::NotFound { entity: "Job", id }
    }
}
