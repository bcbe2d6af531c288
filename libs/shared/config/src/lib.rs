use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_APP_ID: &str = "default-clinic-app-id";
const DEFAULT_SNAPSHOT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub app_id: String,
    pub initial_auth_token: Option<String>,
    pub snapshot_poll_interval_ms: u64,
    pub notification_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            app_id: env::var("APP_ID")
                .unwrap_or_else(|_| {
                    warn!("APP_ID not set, using default");
                    DEFAULT_APP_ID.to_string()
                }),
            initial_auth_token: env::var("INITIAL_AUTH_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            snapshot_poll_interval_ms: parse_u64_var(
                "SNAPSHOT_POLL_INTERVAL_MS",
                DEFAULT_SNAPSHOT_POLL_INTERVAL_MS,
            ),
            notification_ttl_secs: parse_u64_var(
                "NOTIFICATION_TTL_SECS",
                DEFAULT_NOTIFICATION_TTL_SECS,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Configuration with the given store endpoint and defaults for the rest.
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            supabase_anon_key: supabase_anon_key.into(),
            app_id: DEFAULT_APP_ID.to_string(),
            initial_auth_token: None,
            snapshot_poll_interval_ms: DEFAULT_SNAPSHOT_POLL_INTERVAL_MS,
            notification_ttl_secs: DEFAULT_NOTIFICATION_TTL_SECS,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn snapshot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_poll_interval_ms.max(1))
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }
}

fn parse_u64_var(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} is not a number ({}), using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
