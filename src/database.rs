//! Document storage for the `assignments` and `submitted` collections.
//!
//! Handlers only see the [`DocumentStore`] trait. The server opens one store at start-up
//! (Postgres in deployments, memory for local runs and tests) and closes it on shutdown.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreKind};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored document is not an object: {0}")]
    NotAnObject(Uuid),
    #[error("malformed document {0}: {1}")]
    Malformed(Uuid, serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Assignments,
    Submitted,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Assignments => "assignments",
            Collection::Submitted => "submitted",
        }
    }
}

/// A conjunction of equality clauses. Dotted paths reach into nested objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, String)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((path.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, String)] {
        &self.clauses
    }

    pub fn matches(&self, body: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|(path, expected)| {
            let mut segments = path.split('.');
            let mut node = segments.next().and_then(|key| body.get(key));
            for key in segments {
                node = node.and_then(|n| n.get(key));
            }
            matches!(node, Some(Value::String(s)) if s == expected)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Page {
    /// Page `pages` of `size` items each. Without a size every item from the skip onward is returned.
    pub fn new(pages: u64, size: Option<u64>) -> Self {
        Self {
            skip: size.map_or(0, |s| pages.saturating_mul(s)),
            limit: size,
        }
    }
}

/// A stored document: the store-assigned id plus the body fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, StoreError> {
        let id = self.id;
        let mut body = self.body;
        body.insert("_id".into(), Value::String(id.to_string()));
        serde_json::from_value(Value::Object(body)).map_err(|e| StoreError::Malformed(id, e))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAck {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAck {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<Uuid>,
}

impl UpdateAck {
    pub fn matched(modified: bool) -> Self {
        Self {
            acknowledged: true,
            matched_count: 1,
            modified_count: modified as u64,
            upserted_count: 0,
            upserted_id: None,
        }
    }

    pub fn upserted(id: Uuid) -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: Some(id),
        }
    }

    pub fn missed() -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 0,
            upserted_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_one(
        &self,
        collection: Collection,
        body: Map<String, Value>,
    ) -> Result<InsertAck, StoreError>;

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    async fn find_one(&self, collection: Collection, id: Uuid)
    -> Result<Option<Document>, StoreError>;

    /// Replaces the top-level fields in `set`. When `upsert` is set and `id` is absent,
    /// a new document `{_id: id, ...set}` is created.
    async fn update_one(
        &self,
        collection: Collection,
        id: Uuid,
        set: Map<String, Value>,
        upsert: bool,
    ) -> Result<UpdateAck, StoreError>;

    async fn delete_one(&self, collection: Collection, id: Uuid) -> Result<DeleteAck, StoreError>;

    async fn close(&self);
}

/// Opens the store selected by the configuration.
pub async fn init_database(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.store {
        StoreKind::Postgres => Ok(Arc::new(PostgresStore::connect(config).await?)),
        StoreKind::Memory => Ok(Arc::new(MemoryStore::default())),
    }
}

/// Serializes a value that is known to be a JSON object into its field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(serde::ser::Error::custom("expected a JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn filter_matches_nested_paths() {
        let body = object(json!({
            "status": "pending",
            "examinee": { "email": "a@b.com" }
        }));

        assert!(Filter::all().matches(&body));
        assert!(Filter::all().eq("status", "pending").matches(&body));
        assert!(Filter::all().eq("examinee.email", "a@b.com").matches(&body));
        assert!(
            !Filter::all()
                .eq("status", "pending")
                .eq("examinee.email", "x@b.com")
                .matches(&body)
        );
        assert!(!Filter::all().eq("examinee.name", "A").matches(&body));
        assert!(!Filter::all().eq("status.email", "pending").matches(&body));
    }

    #[test]
    fn filter_matches_strings_only() {
        let body = object(json!({ "level": 3, "active": true, "title": "3" }));

        assert!(!Filter::all().eq("level", "3").matches(&body));
        assert!(!Filter::all().eq("active", "true").matches(&body));
        assert!(Filter::all().eq("title", "3").matches(&body));
    }

    #[test]
    fn page_skips_whole_pages() {
        assert_eq!(
            Page::new(2, Some(5)),
            Page {
                skip: 10,
                limit: Some(5)
            }
        );
        assert_eq!(
            Page::new(3, None),
            Page {
                skip: 0,
                limit: None
            }
        );
    }

    #[test]
    fn document_serializes_with_store_id() {
        let id = Uuid::new_v4();
        let doc = Document {
            id,
            body: object(json!({ "title": "Graphs" })),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["_id"], json!(id.to_string()));
        assert_eq!(value["title"], json!("Graphs"));
    }

    #[test]
    fn update_ack_uses_wire_names() {
        let value = serde_json::to_value(UpdateAck::matched(true)).unwrap();
        assert_eq!(value["matchedCount"], json!(1));
        assert_eq!(value["modifiedCount"], json!(1));
        assert_eq!(value["upsertedId"], Value::Null);
    }
}
