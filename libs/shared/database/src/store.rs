use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use shared_models::auth::Identity;
use shared_models::error::AppError;

pub const PATIENTS: &str = "patients";
pub const APPOINTMENTS: &str = "appointments";

pub type Fields = Map<String, Value>;

/// Full-collection snapshots, one item per remote change.
pub type SnapshotStream = BoxStream<'static, Result<Vec<Document>, StoreError>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Unexpected store response: {0}")]
    InvalidResponse(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::InvalidResponse(err.to_string())
        } else {
            StoreError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidResponse(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => AppError::Auth(msg),
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// A stored document: the store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Splits a flat row (`{"id": ..., ...}`) into id and fields.
    pub fn from_row(row: Value) -> Result<Self, StoreError> {
        let mut fields = match row {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidResponse(format!(
                    "expected an object row, got {}",
                    other
                )))
            }
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(StoreError::InvalidResponse("row without id".to_string())),
        };

        Ok(Self { id, fields })
    }

    /// The document as `{id, ...fields}`.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(map)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Seam over the remote realtime document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Attaches the signed-in identity to subsequent requests.
    fn authorize(&self, _identity: &Identity) {}

    /// Inserts a document and returns the store-assigned id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Merges `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Point query: every document whose `field` equals `value`.
    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Push subscription. The first item is the current contents; each later
    /// item is the complete collection after a remote change. An `Err` item
    /// ends the stream.
    fn subscribe(&self, collection: &str) -> SnapshotStream;
}
