//! Shared error types for the services crate.

use thiserror::Error;

use assessment_core::SessionError;
use backend::BackendError;

/// Errors emitted by `AssessmentController` and `ResultHistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AssessmentError {
    /// Rejected locally before any network call (empty or incomplete answer set).
    #[must_use]
    pub fn is_local_validation(&self) -> bool {
        matches!(self, AssessmentError::Session(e) if e.is_local_validation())
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssessmentError::Backend(e) if e.is_retryable())
    }
}
