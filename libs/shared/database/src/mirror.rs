use std::sync::Arc;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::store::{Document, DocumentStore, SnapshotStream, StoreError};

/// What a mirror currently holds.
#[derive(Debug)]
pub struct MirrorState<T> {
    pub items: Arc<Vec<T>>,
    pub loading: bool,
    pub last_error: Option<StoreError>,
    /// Increments on every subscription error, so consumers can tell a new
    /// failure from one they already reported.
    pub error_count: u64,
    pub deliveries: u64,
}

impl<T> MirrorState<T> {
    fn loading() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            loading: true,
            last_error: None,
            error_count: 0,
            deliveries: 0,
        }
    }
}

impl<T> Clone for MirrorState<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            loading: self.loading,
            last_error: self.last_error.clone(),
            error_count: self.error_count,
            deliveries: self.deliveries,
        }
    }
}

/// Local copy of a remote collection, replaced wholesale on every snapshot.
///
/// A single dispatcher task owns the subscription and is the only writer of
/// the state; everything else reads through the watch channel.
pub struct LiveMirror<T> {
    collection: String,
    state: watch::Receiver<MirrorState<T>>,
    task: JoinHandle<()>,
}

impl<T> LiveMirror<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn attach(store: Arc<dyn DocumentStore>, collection: &str) -> Self {
        info!("Attaching mirror for {}", collection);

        let (sender, receiver) = watch::channel(MirrorState::loading());
        let stream = store.subscribe(collection);
        let task = tokio::spawn(dispatch(collection.to_string(), stream, sender));

        Self {
            collection: collection.to_string(),
            state: receiver,
            task,
        }
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.state.borrow().items)
    }

    pub fn state(&self) -> MirrorState<T> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<MirrorState<T>> {
        self.state.clone()
    }

    /// Waits until the state satisfies `predicate`. Returns `None` if the
    /// dispatcher is gone and the predicate never held.
    pub async fn wait_until<F>(&self, predicate: F) -> Option<MirrorState<T>>
    where
        F: FnMut(&MirrorState<T>) -> bool,
    {
        let mut receiver = self.state.clone();
        let state = receiver.wait_for(predicate).await.ok().map(|state| state.clone());
        state
    }

    pub fn detach(self) {
        info!("Detaching mirror for {}", self.collection);
        self.task.abort();
    }
}

impl<T> Drop for LiveMirror<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn dispatch<T>(
    collection: String,
    mut stream: SnapshotStream,
    sender: watch::Sender<MirrorState<T>>,
) where
    T: DeserializeOwned + Send + Sync + 'static,
{
    while let Some(event) = stream.next().await {
        match event {
            Ok(documents) => {
                let items = decode_all::<T>(&collection, &documents);
                debug!("{} snapshot: {} documents", collection, items.len());
                sender.send_modify(|state| {
                    state.items = Arc::new(items);
                    state.loading = false;
                    state.deliveries += 1;
                });
            }
            Err(err) => {
                error!("Subscription to {} failed: {}", collection, err);
                sender.send_modify(|state| {
                    state.loading = false;
                    state.last_error = Some(err);
                    state.error_count += 1;
                });
                break;
            }
        }
    }
    debug!("Dispatcher for {} stopped", collection);
}

fn decode_all<T: DeserializeOwned>(collection: &str, documents: &[Document]) -> Vec<T> {
    documents
        .iter()
        .filter_map(|document| match document.decode::<T>() {
            Ok(item) => Some(item),
            Err(err) => {
                warn!("Skipping undecodable {}/{}: {}", collection, document.id, err);
                None
            }
        })
        .collect()
}
