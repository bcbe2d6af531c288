pub mod identity;
pub mod supabase_auth;

pub use identity::{IdentityBootstrap, IdentityProvider};
pub use supabase_auth::SupabaseIdentityProvider;
