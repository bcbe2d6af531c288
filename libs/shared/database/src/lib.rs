pub mod memory;
pub mod mirror;
pub mod store;
pub mod supabase;
pub mod supabase_store;

pub use memory::InMemoryStore;
pub use mirror::{LiveMirror, MirrorState};
pub use store::{Document, DocumentStore, Fields, SnapshotStream, StoreError, APPOINTMENTS, PATIENTS};
pub use supabase::SupabaseClient;
pub use supabase_store::SupabaseStore;
