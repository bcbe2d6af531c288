use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Another operation is still being submitted")]
    Busy,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Startup failures render a full-screen error with no way forward.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Auth(_) | AppError::Config(_))
    }

    /// Rejected before any remote call was issued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::ValidationError(_) | AppError::Conflict(_) | AppError::Busy
        )
    }

    pub fn log(&self) {
        if self.is_validation() {
            tracing::warn!("Rejected: {}", self);
        } else {
            tracing::error!("Error: {}", self);
        }
    }
}
