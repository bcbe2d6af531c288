use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Identity service is not configured")]
    NotConfigured,

    /// The service refused the token (mismatched project, expired, malformed).
    #[error("Token rejected: {0}")]
    TokenRejected(String),

    #[error("Anonymous sign-in failed: {0}")]
    AnonymousSignInFailed(String),

    #[error("Identity service error: {0}")]
    Service(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => AuthError::TokenRejected(msg),
            other => AuthError::Service(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured => AppError::Config(err.to_string()),
            other => AppError::Auth(other.to_string()),
        }
    }
}
