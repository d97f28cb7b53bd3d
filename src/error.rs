//! Error type shared by the services and repositories.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The entity does not exist or is owned by someone else.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The write would duplicate an existing entity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The completion service failed or answered with a non-success status.
    #[error("completion service error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("prompt rendering failed: {0}")]
    Prompt(#[from] minijinja::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
