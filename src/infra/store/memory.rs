use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use mongodb::bson::{oid::ObjectId, Document};

use super::{revision_of, DocumentStore, StoreError, WriteMode, ID, REVISION};

type Collection = BTreeMap<ObjectId, Document>;

/// Process-local document store. Filters support field equality only.
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut Collection) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut collections = self.collections.lock().map_err(|_| StoreError::Poisoned())?;
        f(collections.entry(collection.to_string()).or_default())
    }
}

fn matches(record: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, value)| record.get(key) == Some(value))
}

fn not_found(collection: &str, id: &ObjectId) -> StoreError {
    StoreError::NotFound(collection.to_string(), *id)
}

impl DocumentStore for InMemoryStore {
    fn get(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, StoreError> {
        self.with_collection(collection, |docs| Ok(docs.get(id).cloned()))
    }

    fn query(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        self.with_collection(collection, |docs| {
            Ok(docs
                .values()
                .filter(|record| matches(record, &filter))
                .cloned()
                .collect())
        })
    }

    fn add(&self, collection: &str, mut record: Document) -> Result<ObjectId, StoreError> {
        let id = ObjectId::new();
        record.insert(ID, id);
        record.insert(REVISION, 0_i64);
        self.with_collection(collection, |docs| {
            docs.insert(id, record);
            Ok(id)
        })
    }

    fn set(
        &self,
        collection: &str,
        id: &ObjectId,
        mut record: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let expected = revision_of(&record);
        self.with_collection(collection, |docs| {
            let current = docs.get(id).ok_or_else(|| not_found(collection, id))?;
            let stored = revision_of(current);
            if mode == WriteMode::CompareAndSwap && stored != expected {
                return Err(StoreError::Conflict(collection.to_string(), *id));
            }
            record.insert(ID, *id);
            record.insert(REVISION, stored + 1);
            docs.insert(*id, record);
            Ok(())
        })
    }

    fn update(&self, collection: &str, id: &ObjectId, partial: Document) -> Result<(), StoreError> {
        self.with_collection(collection, |docs| {
            let current = docs.get_mut(id).ok_or_else(|| not_found(collection, id))?;
            let next = revision_of(current) + 1;
            for (key, value) in partial {
                if key != ID && key != REVISION {
                    current.insert(key, value);
                }
            }
            current.insert(REVISION, next);
            Ok(())
        })
    }

    fn delete(&self, collection: &str, id: &ObjectId) -> Result<(), StoreError> {
        self.with_collection(collection, |docs| {
            docs.remove(id).map(|_| ()).ok_or_else(|| not_found(collection, id))
        })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    #[test]
    fn test_add_assigns_id_and_revision() {
        let store = InMemoryStore::new();
        let id = store.add("recipes", doc! {"title": "soup"}).unwrap();
        let record = store.get("recipes", &id).unwrap().unwrap();
        assert_eq!(record.get_object_id("_id").unwrap(), id);
        assert_eq!(revision_of(&record), 0);
    }

    #[test]
    fn test_query_by_field_equality() {
        let store = InMemoryStore::new();
        store.add("recipes", doc! {"email": "a@example.com", "shared": true}).unwrap();
        store.add("recipes", doc! {"email": "b@example.com", "shared": true}).unwrap();
        store.add("recipes", doc! {"email": "a@example.com", "shared": false}).unwrap();

        assert_eq!(store.query("recipes", doc! {}).unwrap().len(), 3);
        assert_eq!(store.query("recipes", doc! {"shared": true}).unwrap().len(), 2);
        let mine = store
            .query("recipes", doc! {"email": "a@example.com", "shared": false})
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert!(store.query("users", doc! {}).unwrap().is_empty());
    }

    #[test]
    fn test_compare_and_swap_rejects_stale_write() {
        let store = InMemoryStore::new();
        let id = store.add("recipes", doc! {"title": "soup"}).unwrap();
        let first = store.get("recipes", &id).unwrap().unwrap();
        let second = first.clone();

        let mut winner = first;
        winner.insert("title", "stew");
        store.set("recipes", &id, winner, WriteMode::CompareAndSwap).unwrap();

        let mut loser = second;
        loser.insert("title", "broth");
        let err = store
            .set("recipes", &id, loser, WriteMode::CompareAndSwap)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_, _)));

        let stored = store.get("recipes", &id).unwrap().unwrap();
        assert_eq!(stored.get_str("title").unwrap(), "stew");
        assert_eq!(revision_of(&stored), 1);
    }

    #[test]
    fn test_overwrite_lets_last_write_win() {
        let store = InMemoryStore::new();
        let id = store.add("recipes", doc! {"title": "soup"}).unwrap();
        let first = store.get("recipes", &id).unwrap().unwrap();
        let mut second = first.clone();

        let mut winner = first;
        winner.insert("title", "stew");
        store.set("recipes", &id, winner, WriteMode::Overwrite).unwrap();

        second.insert("title", "broth");
        store.set("recipes", &id, second, WriteMode::Overwrite).unwrap();

        let stored = store.get("recipes", &id).unwrap().unwrap();
        assert_eq!(stored.get_str("title").unwrap(), "broth");
        // the stale writer read revision 0, the counter still moves forward
        assert_eq!(revision_of(&stored), 2);
    }

    #[test]
    fn test_update_patches_fields() {
        let store = InMemoryStore::new();
        let id = store
            .add("users", doc! {"email": "a@example.com", "nickname": "old"})
            .unwrap();
        store
            .update("users", &id, doc! {"nickname": "new", "_rev": 40_i64})
            .unwrap();
        let stored = store.get("users", &id).unwrap().unwrap();
        assert_eq!(stored.get_str("nickname").unwrap(), "new");
        assert_eq!(stored.get_str("email").unwrap(), "a@example.com");
        assert_eq!(revision_of(&stored), 1);
    }

    #[test]
    #[should_panic(expected = "NotFound")]
    fn test_delete_missing_document() {
        let store = InMemoryStore::new();
        store.delete("recipes", &ObjectId::new()).unwrap();
    }

    #[test]
    #[should_panic(expected = "NotFound")]
    fn test_set_missing_document() {
        let store = InMemoryStore::new();
        store
            .set("recipes", &ObjectId::new(), doc! {}, WriteMode::Overwrite)
            .unwrap();
    }
}
