//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    /// Whether the failure is a rejected edit the caller can recover from.
    pub fn is_invalid_target(&self) -> bool {
        matches!(self, Self::Domain(DomainError::InvalidTarget { .. }))
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
