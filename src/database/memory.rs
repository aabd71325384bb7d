use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Collection, DeleteAck, Document, DocumentStore, Filter, InsertAck, Page, StoreError, UpdateAck,
};

/// In-process store. Documents are kept in insertion order per collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

/// Offsets past `usize::MAX` saturate instead of wrapping.
fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(
        &self,
        collection: Collection,
        body: Map<String, Value>,
    ) -> Result<InsertAck, StoreError> {
        let id = Uuid::new_v4();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection)
            .or_default()
            .push(Document { id, body });

        Ok(InsertAck {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let matching = docs.iter().filter(|d| filter.matches(&d.body));
        let found = match page {
            Some(Page { skip, limit }) => matching
                .skip(to_usize(skip))
                .take(limit.map_or(usize::MAX, to_usize))
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };

        Ok(found)
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map_or(0, |docs| docs.iter().filter(|d| filter.matches(&d.body)).count()) as u64)
    }

    async fn find_one(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn update_one(
        &self,
        collection: Collection,
        id: Uuid,
        set: Map<String, Value>,
        upsert: bool,
    ) -> Result<UpdateAck, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if let Some(doc) = docs.iter_mut().find(|d| d.id == id) {
            let mut modified = false;
            for (key, value) in set {
                if doc.body.get(&key) != Some(&value) {
                    doc.body.insert(key, value);
                    modified = true;
                }
            }
            return Ok(UpdateAck::matched(modified));
        }

        if !upsert {
            return Ok(UpdateAck::missed());
        }

        docs.push(Document { id, body: set });
        Ok(UpdateAck::upserted(id))
    }

    async fn delete_one(&self, collection: Collection, id: Uuid) -> Result<DeleteAck, StoreError> {
        let mut collections = self.collections.write().await;
        let deleted_count = match collections.get_mut(&collection) {
            Some(docs) => {
                let before = docs.len();
                docs.retain(|d| d.id != id);
                (before - docs.len()) as u64
            }
            None => 0,
        };

        Ok(DeleteAck {
            acknowledged: true,
            deleted_count,
        })
    }

    async fn close(&self) {
        tracing::info!("Memory store dropped");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    async fn seeded(levels: &[&str]) -> MemoryStore {
        let store = MemoryStore::default();
        for (i, level) in levels.iter().enumerate() {
            store
                .insert_one(
                    Collection::Assignments,
                    fields(json!({ "title": format!("a{i}"), "level": level })),
                )
                .await
                .unwrap();
        }
        store
    }

    fn titles(docs: &[Document]) -> Vec<String> {
        docs.iter()
            .map(|d| d.body["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn pages_concatenate_to_prefix() {
        let store = seeded(&["easy"; 7]).await;

        let mut paged = Vec::new();
        for p in 0..3 {
            let page = store
                .find(Collection::Assignments, &Filter::all(), Some(Page::new(p, Some(2))))
                .await
                .unwrap();
            assert!(page.len() <= 2);
            paged.extend(page);
        }

        let whole = store
            .find(Collection::Assignments, &Filter::all(), Some(Page::new(0, Some(6))))
            .await
            .unwrap();

        assert_eq!(titles(&paged), titles(&whole));
        assert_eq!(titles(&whole), vec!["a0", "a1", "a2", "a3", "a4", "a5"]);
    }

    #[tokio::test]
    async fn huge_offsets_saturate() {
        let store = seeded(&["easy"; 3]).await;

        let past_end = Page {
            skip: u64::MAX,
            limit: Some(u64::MAX),
        };
        let everything = Page {
            skip: 0,
            limit: Some(u64::MAX),
        };

        assert!(
            store
                .find(Collection::Assignments, &Filter::all(), Some(past_end))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store
                .find(Collection::Assignments, &Filter::all(), Some(everything))
                .await
                .unwrap()
                .len(),
            3
        );
        assert_eq!(to_usize(u64::MAX), usize::MAX);
    }

    #[tokio::test]
    async fn count_ignores_paging() {
        let store = seeded(&["easy", "hard", "easy", "medium", "easy"]).await;
        let easy = Filter::all().eq("level", "easy");

        let page = store
            .find(Collection::Assignments, &easy, Some(Page::new(0, Some(2))))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(store.count(Collection::Assignments, &easy).await.unwrap(), 3);
        assert_eq!(
            store
                .count(Collection::Assignments, &Filter::all())
                .await
                .unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn update_reports_modification() {
        let store = MemoryStore::default();
        let ack = store
            .insert_one(Collection::Submitted, fields(json!({ "status": "pending" })))
            .await
            .unwrap();
        let id = ack.inserted_id;

        let first = store
            .update_one(
                Collection::Submitted,
                id,
                fields(json!({ "status": "checked" })),
                false,
            )
            .await
            .unwrap();
        assert_eq!(first, UpdateAck::matched(true));

        let again = store
            .update_one(
                Collection::Submitted,
                id,
                fields(json!({ "status": "checked" })),
                false,
            )
            .await
            .unwrap();
        assert_eq!(again, UpdateAck::matched(false));
    }

    #[tokio::test]
    async fn update_missing_id_upserts_only_when_asked() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();

        let missed = store
            .update_one(Collection::Assignments, id, fields(json!({ "title": "x" })), false)
            .await
            .unwrap();
        assert_eq!(missed, UpdateAck::missed());
        assert!(
            store
                .find_one(Collection::Assignments, id)
                .await
                .unwrap()
                .is_none()
        );

        let upserted = store
            .update_one(Collection::Assignments, id, fields(json!({ "title": "x" })), true)
            .await
            .unwrap();
        assert_eq!(upserted, UpdateAck::upserted(id));
        let doc = store
            .find_one(Collection::Assignments, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.body["title"], json!("x"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = seeded(&["easy"]).await;
        let id = store
            .find(Collection::Assignments, &Filter::all(), None)
            .await
            .unwrap()[0]
            .id;

        let first = store.delete_one(Collection::Assignments, id).await.unwrap();
        assert_eq!(first.deleted_count, 1);
        let second = store.delete_one(Collection::Assignments, id).await.unwrap();
        assert_eq!(second.deleted_count, 0);
    }
}
