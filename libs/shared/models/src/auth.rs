use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DISPLAY_ID_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInMethod {
    Token,
    Anonymous,
}

/// The single ambient identity every data operation runs under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub access_token: Option<String>,
    pub method: SignInMethod,
    pub signed_in_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(id: impl Into<String>, access_token: Option<String>, method: SignInMethod) -> Self {
        Self {
            id: id.into(),
            access_token,
            method,
            signed_in_at: Utc::now(),
        }
    }

    /// Identity string as shown in the footer: first ten characters and an ellipsis.
    pub fn display_id(&self) -> String {
        let short: String = self.id.chars().take(DISPLAY_ID_LEN).collect();
        format!("{}...", short)
    }
}

/// Subset of the identity service's user payload we care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub user: AuthUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_id_truncates() {
        let identity = Identity::new("abcdefghijklmnop", None, SignInMethod::Anonymous);
        assert_eq!(identity.display_id(), "abcdefghij...");

        let identity = Identity::new("abc", None, SignInMethod::Token);
        assert_eq!(identity.display_id(), "abc...");
    }
}
