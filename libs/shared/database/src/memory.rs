use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::store::{Document, DocumentStore, Fields, SnapshotStream, StoreError};

type SnapshotEvent = Result<Vec<Document>, StoreError>;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    channels: HashMap<String, broadcast::Sender<SnapshotEvent>>,
    failure: Option<StoreError>,
    writes: u64,
}

impl MemoryState {
    fn check(&self) -> Result<(), StoreError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn publish(&self, collection: &str) {
        if let Some(sender) = self.channels.get(collection) {
            let snapshot = self.collections.get(collection).cloned().unwrap_or_default();
            // No receivers just means nobody is mirroring this collection.
            let _ = sender.send(Ok(snapshot));
        }
    }

    fn sender(&mut self, collection: &str) -> broadcast::Sender<SnapshotEvent> {
        self.channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

/// Process-local document store with realtime fan-out to subscribers.
///
/// Documents keep insertion order. Every successful write pushes the full
/// collection to all live subscriptions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the maps half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seeds a document with a fixed id, bypassing the write counter.
    pub fn insert_document(&self, collection: &str, document: Document) {
        let mut state = self.state();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
        state.publish(collection);
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state().collections.get(collection).cloned().unwrap_or_default()
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.state()
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned())
    }

    /// Number of successful `add`/`update` calls.
    pub fn write_count(&self) -> u64 {
        self.state().writes
    }

    /// Makes every following operation fail with `err` until cleared.
    pub fn fail_with(&self, err: StoreError) {
        self.state().failure = Some(err);
    }

    pub fn clear_failure(&self) {
        self.state().failure = None;
    }

    /// Delivers `err` to the live subscriptions of `collection`, ending them.
    pub fn break_subscriptions(&self, collection: &str, err: StoreError) {
        let mut state = self.state();
        let sender = state.sender(collection);
        let _ = sender.send(Err(err));
        state.channels.remove(collection);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let mut state = self.state();
        state.check()?;

        let id = Uuid::new_v4().simple().to_string();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document::new(id.clone(), fields));
        state.writes += 1;
        state.publish(collection);

        debug!("Inserted {}/{}", collection, id);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check()?;

        let document = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        document.fields.extend(fields);

        state.writes += 1;
        state.publish(collection);

        debug!("Updated {}/{}", collection, id);
        Ok(())
    }

    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let state = self.state();
        state.check()?;

        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| doc.field(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let state = self.state();
        state.check()?;
        Ok(state.collections.get(collection).cloned().unwrap_or_default())
    }

    fn subscribe(&self, collection: &str) -> SnapshotStream {
        let mut state = self.state();

        let initial: SnapshotEvent = match state.check() {
            Ok(()) => Ok(state.collections.get(collection).cloned().unwrap_or_default()),
            Err(err) => return futures::stream::once(async move { Err(err) }).boxed(),
        };
        let receiver = state.sender(collection).subscribe();
        drop(state);

        let updates = futures::stream::unfold((receiver, false), |(mut receiver, ended)| async move {
            if ended {
                return None;
            }
            loop {
                match receiver.recv().await {
                    Ok(Ok(snapshot)) => return Some((Ok(snapshot), (receiver, false))),
                    Ok(Err(err)) => return Some((Err(err), (receiver, true))),
                    // Snapshots are complete, so skipping stale ones loses nothing.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        futures::stream::once(async move { initial }).chain(updates).boxed()
    }
}
