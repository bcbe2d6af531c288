use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::auth::Identity;

use crate::store::{Document, DocumentStore, Fields, SnapshotStream, StoreError};
use crate::supabase::SupabaseClient;

/// PostgREST-backed document store.
///
/// Each collection is a table whose columns are the document fields. Snapshot
/// delivery re-reads the table on an interval and right after every write made
/// through this store, and only emits when the contents changed.
///
/// Writes bump a generation counter. Each subscription compares it against
/// the last generation it read, so a write that lands mid-read still triggers
/// another read.
#[derive(Clone)]
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
    session: Arc<RwLock<Option<String>>>,
    poll_interval: Duration,
    writes: Arc<watch::Sender<u64>>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            session: Arc::new(RwLock::new(None)),
            poll_interval: config.snapshot_poll_interval(),
            writes: Arc::new(watch::Sender::new(0)),
        }
    }

    fn token(&self) -> Option<String> {
        self.session.read().map(|token| token.clone()).unwrap_or(None)
    }

    async fn fetch_rows(&self, path: &str) -> Result<Vec<Document>, StoreError> {
        let token = self.token();
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            token.as_deref(),
            None,
        ).await?;

        rows.into_iter().map(Document::from_row).collect()
    }

    fn record_write(&self) {
        self.writes.send_modify(|generation| *generation += 1);
    }
}

fn collection_path(collection: &str) -> String {
    format!("/rest/v1/{}", urlencoding::encode(collection))
}

fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    fn authorize(&self, identity: &Identity) {
        match self.session.write() {
            Ok(mut session) => *session = identity.access_token.clone(),
            Err(_) => warn!("Session lock poisoned, keeping previous token"),
        }
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        debug!("Inserting document into {}", collection);
        let token = self.token();

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            &collection_path(collection),
            token.as_deref(),
            Some(Value::Object(fields)),
            Some(SupabaseClient::return_representation()),
        ).await?;

        let row = result.into_iter().next().ok_or_else(|| {
            StoreError::InvalidResponse(format!("insert into {} returned no rows", collection))
        })?;
        let document = Document::from_row(row)?;

        self.record_write();
        Ok(document.id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        debug!("Updating document {}/{}", collection, id);
        let token = self.token();
        let path = format!("{}?id=eq.{}", collection_path(collection), urlencoding::encode(id));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            token.as_deref(),
            Some(Value::Object(fields)),
            Some(SupabaseClient::return_representation()),
        ).await?;

        if result.is_empty() {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        }

        self.record_write();
        Ok(())
    }

    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let path = format!(
            "{}?{}=eq.{}",
            collection_path(collection),
            urlencoding::encode(field),
            urlencoding::encode(&filter_literal(value)),
        );
        self.fetch_rows(&path).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let path = format!("{}?select=*", collection_path(collection));
        self.fetch_rows(&path).await
    }

    fn subscribe(&self, collection: &str) -> SnapshotStream {
        info!("Subscribing to {} (poll every {:?})", collection, self.poll_interval);

        let state = PollState {
            writes: self.writes.subscribe(),
            store: self.clone(),
            collection: collection.to_string(),
            last: None,
            first: true,
            finished: false,
        };

        futures::stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }

            loop {
                if !state.first {
                    tokio::select! {
                        _ = tokio::time::sleep(state.store.poll_interval) => {}
                        Ok(()) = state.writes.changed() => {}
                    }
                }
                state.first = false;
                state.writes.borrow_and_update();

                match state.store.list(&state.collection).await {
                    Ok(documents) => {
                        if state.last.as_ref() == Some(&documents) {
                            continue;
                        }
                        state.last = Some(documents.clone());
                        return Some((Ok(documents), state));
                    }
                    Err(err) => {
                        warn!("Snapshot read for {} failed: {}", state.collection, err);
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                }
            }
        })
        .boxed()
    }
}

struct PollState {
    store: SupabaseStore,
    writes: watch::Receiver<u64>,
    collection: String,
    last: Option<Vec<Document>>,
    first: bool,
    finished: bool,
}
