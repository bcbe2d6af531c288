use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use shared_models::auth::Identity;

use crate::models::AuthError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_token(&self, token: &str) -> Result<Identity, AuthError>;

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;
}

/// Acquires the one identity the desk runs under.
pub struct IdentityBootstrap {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityBootstrap {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Token sign-in first, anonymous sign-in when the token is absent or
    /// rejected. Any other failure is final; there is no retry.
    pub async fn acquire(&self, initial_token: Option<&str>) -> Result<Identity, AuthError> {
        match initial_token {
            Some(token) => {
                debug!("Signing in with initial token");
                match self.provider.sign_in_with_token(token).await {
                    Ok(identity) => {
                        info!("Signed in with token as {}", identity.display_id());
                        return Ok(identity);
                    }
                    Err(AuthError::TokenRejected(reason)) => {
                        warn!("Initial token rejected ({}), falling back to anonymous sign-in", reason);
                    }
                    Err(err) => {
                        error!("Token sign-in failed: {}", err);
                        return Err(err);
                    }
                }
            }
            None => warn!("No initial token, trying anonymous sign-in"),
        }

        match self.provider.sign_in_anonymously().await {
            Ok(identity) => {
                info!("Signed in anonymously as {}", identity.display_id());
                Ok(identity)
            }
            Err(err) => {
                error!("Anonymous sign-in failed: {}", err);
                Err(match err {
                    AuthError::AnonymousSignInFailed(_) | AuthError::NotConfigured => err,
                    other => AuthError::AnonymousSignInFailed(other.to_string()),
                })
            }
        }
    }
}
