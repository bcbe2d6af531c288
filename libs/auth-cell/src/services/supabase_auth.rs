use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{AuthUser, Identity, SessionResponse, SignInMethod};

use crate::models::AuthError;
use crate::services::identity::IdentityProvider;

/// Identity provider backed by the Supabase auth endpoints.
pub struct SupabaseIdentityProvider {
    supabase: SupabaseClient,
    configured: bool,
}

impl SupabaseIdentityProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            configured: config.is_configured(),
        }
    }

    fn ensure_configured(&self) -> Result<(), AuthError> {
        if self.configured {
            Ok(())
        } else {
            Err(AuthError::NotConfigured)
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_in_with_token(&self, token: &str) -> Result<Identity, AuthError> {
        self.ensure_configured()?;
        debug!("Verifying initial token against /auth/v1/user");

        let user: AuthUser = self.supabase.request(
            Method::GET,
            "/auth/v1/user",
            Some(token),
            None,
        ).await?;

        Ok(Identity::new(user.id, Some(token.to_string()), SignInMethod::Token))
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        self.ensure_configured()?;
        debug!("Requesting anonymous session");

        let session: SessionResponse = self.supabase.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({})),
        ).await
        .map_err(|e| AuthError::AnonymousSignInFailed(e.to_string()))?;

        Ok(Identity::new(
            session.user.id,
            Some(session.access_token),
            SignInMethod::Anonymous,
        ))
    }
}
