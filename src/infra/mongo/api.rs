use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::Error as mongoError,
    sync::{Client, Collection, Database},
};
use tracing::debug;

use crate::infra::store::{revision_of, DocumentStore, StoreError, WriteMode, ID, REVISION};

pub struct MongoRep {
    database: Database,
}

impl MongoRep {
    pub fn init(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)?;
        let rep = MongoRep {
            database: client.database(database),
        };
        Ok(rep)
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    // a replace matched nothing: either the document is gone or its revision moved
    fn missed(&self, collection: &str, id: ObjectId) -> StoreError {
        match self.collection(collection).find_one(doc! {"_id": id}, None) {
            Ok(Some(_)) => StoreError::Conflict(collection.to_string(), id),
            Ok(None) => StoreError::NotFound(collection.to_string(), id),
            Err(e) => StoreError::from(e),
        }
    }

    // last write wins on the body, the stored revision is still incremented
    fn overwrite(
        &self,
        collection: &str,
        id: ObjectId,
        mut record: Document,
    ) -> Result<(), StoreError> {
        record.remove(REVISION);
        let pipeline = vec![doc! {
            "$replaceWith": {
                "$mergeObjects": [
                    {"$literal": record},
                    {"_rev": {"$add": [{"$ifNull": ["$_rev", 0_i64]}, 1_i64]}},
                ]
            }
        }];
        let result = self
            .collection(collection)
            .update_one(doc! {"_id": id}, pipeline, None)
            .map_err(StoreError::from)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound(collection.to_string(), id));
        }
        debug!(collection, %id, "overwrote document");
        Ok(())
    }
}

impl DocumentStore for MongoRep {
    fn get(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, StoreError> {
        let id = *id;
        self.collection(collection)
            .find_one(doc! {"_id": id}, None)
            .map_err(StoreError::from)
    }

    fn query(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .collection(collection)
            .find(filter, None)
            .map_err(StoreError::from)?;
        cursor
            .collect::<Result<Vec<Document>, mongoError>>()
            .map_err(StoreError::from)
    }

    fn add(&self, collection: &str, mut record: Document) -> Result<ObjectId, StoreError> {
        record.remove(ID);
        record.insert(REVISION, 0_i64);
        let result = self
            .collection(collection)
            .insert_one(record, None)
            .map_err(StoreError::from)?;
        result.inserted_id.as_object_id().ok_or(StoreError::MissingId())
    }

    fn set(
        &self,
        collection: &str,
        id: &ObjectId,
        mut record: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let id = *id;
        let expected = revision_of(&record);
        record.insert(ID, id);

        if mode == WriteMode::Overwrite {
            return self.overwrite(collection, id, record);
        }
        record.insert(REVISION, expected + 1);
        let filter = if expected == 0 {
            // documents written before revisions existed have no _rev field
            doc! {"_id": id, "_rev": {"$in": [0_i64, null]}}
        } else {
            doc! {"_id": id, "_rev": expected}
        };
        let result = self
            .collection(collection)
            .replace_one(filter, record, None)
            .map_err(StoreError::from)?;
        if result.matched_count == 0 {
            return Err(self.missed(collection, id));
        }
        debug!(collection, %id, revision = expected + 1, "replaced document");
        Ok(())
    }

    fn update(
        &self,
        collection: &str,
        id: &ObjectId,
        mut partial: Document,
    ) -> Result<(), StoreError> {
        let id = *id;
        partial.remove(ID);
        partial.remove(REVISION);
        let result = self
            .collection(collection)
            .update_one(
                doc! {"_id": id},
                doc! {"$set": partial, "$inc": {"_rev": 1_i64}},
                None,
            )
            .map_err(StoreError::from)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound(collection.to_string(), id));
        }
        Ok(())
    }

    fn delete(&self, collection: &str, id: &ObjectId) -> Result<(), StoreError> {
        let id = *id;
        let result = self
            .collection(collection)
            .delete_one(doc! {"_id": id}, None)
            .map_err(StoreError::from)?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound(collection.to_string(), id));
        }
        Ok(())
    }
}

// These talk to a local mongod: `cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "mongodb://localhost:27017/";

    fn init_repo(database: &str) -> MongoRep {
        MongoRep::init(URI, database).unwrap()
    }

    #[test]
    #[ignore]
    fn test_init_mongo_repo_passes() {
        init_repo("recipe-back-test");
    }

    #[test]
    #[ignore]
    fn test_add_then_get_passes() {
        let mongo_rep = init_repo("recipe-back-test");
        let id = mongo_rep
            .add("recipes", doc! {"title": "Pancakes", "email": "cook@example.com"})
            .unwrap();
        let record = mongo_rep.get("recipes", &id).unwrap().unwrap();
        assert_eq!(record.get_str("title").unwrap(), "Pancakes");
        assert_eq!(revision_of(&record), 0);
        mongo_rep.delete("recipes", &id).unwrap();
    }

    #[test]
    #[ignore]
    fn test_compare_and_swap_conflict() {
        let mongo_rep = init_repo("recipe-back-test");
        let id = mongo_rep.add("recipes", doc! {"title": "Soup"}).unwrap();
        let read = mongo_rep.get("recipes", &id).unwrap().unwrap();
        mongo_rep
            .set("recipes", &id, read.clone(), WriteMode::CompareAndSwap)
            .unwrap();
        let err = mongo_rep
            .set("recipes", &id, read, WriteMode::CompareAndSwap)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_, _)));
        mongo_rep.delete("recipes", &id).unwrap();
    }

    #[test]
    #[ignore]
    fn test_overwrite_keeps_revision_increasing() {
        let mongo_rep = init_repo("recipe-back-test");
        let id = mongo_rep.add("recipes", doc! {"title": "Soup"}).unwrap();
        let stale = mongo_rep.get("recipes", &id).unwrap().unwrap();
        mongo_rep
            .set("recipes", &id, stale.clone(), WriteMode::Overwrite)
            .unwrap();
        mongo_rep
            .set("recipes", &id, stale, WriteMode::Overwrite)
            .unwrap();
        let record = mongo_rep.get("recipes", &id).unwrap().unwrap();
        assert_eq!(revision_of(&record), 2);
        mongo_rep.delete("recipes", &id).unwrap();
    }

    #[test]
    #[ignore]
    #[should_panic(expected = "NotFound")]
    fn test_delete_missing_recipe() {
        let mongo_rep = init_repo("recipe-back-test");
        mongo_rep.delete("recipes", &ObjectId::new()).unwrap();
    }
}
