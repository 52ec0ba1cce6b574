//! Document store collaborator.
//!
//! Collections of BSON documents addressed by `_id`. Every stored document
//! carries a `_rev` counter owned by the store: `set` writes `_rev + 1` of the
//! record it is given, and in [`WriteMode::CompareAndSwap`] only succeeds if
//! the stored revision still equals the record's. A document without `_rev`
//! is at revision 0.

use std::str::FromStr;

use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryStore;

pub const ID: &str = "_id";
pub const REVISION: &str = "_rev";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("error querying value")]
    QueryError(#[from] mongodb::error::Error),
    #[error("error encoding document: {0}")]
    EncodeError(#[from] bson::ser::Error),
    #[error("error decoding document: {0}")]
    DecodeError(#[from] bson::de::Error),
    #[error("document {1} not found in {0}")]
    NotFound(String, ObjectId),
    #[error("document {1} in {0} changed since it was read")]
    Conflict(String, ObjectId),
    #[error("store returned no id for inserted document")]
    MissingId(),
    #[error("store lock poisoned")]
    Poisoned(),
}

/// How `set` treats a document that changed after it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace unconditionally, last write wins.
    Overwrite,
    /// Replace only if the stored revision is the one that was read.
    #[default]
    CompareAndSwap,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(WriteMode::Overwrite),
            "cas" | "compare-and-swap" => Ok(WriteMode::CompareAndSwap),
            other => Err(format!("unknown write mode {other}, expected cas or overwrite")),
        }
    }
}

pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, StoreError>;

    /// Documents whose fields equal every field of `filter`. An empty filter
    /// matches the whole collection.
    fn query(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError>;

    fn add(&self, collection: &str, record: Document) -> Result<ObjectId, StoreError>;

    /// Replaces the whole document.
    fn set(
        &self,
        collection: &str,
        id: &ObjectId,
        record: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Overwrites only the fields present in `partial`.
    fn update(&self, collection: &str, id: &ObjectId, partial: Document) -> Result<(), StoreError>;

    fn delete(&self, collection: &str, id: &ObjectId) -> Result<(), StoreError>;
}

pub fn revision_of(record: &Document) -> i64 {
    match record.get(REVISION) {
        Some(Bson::Int64(rev)) => *rev,
        Some(Bson::Int32(rev)) => i64::from(*rev),
        _ => 0,
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    Ok(bson::to_document(value)?)
}

pub fn decode<T: DeserializeOwned>(record: Document) -> Result<T, StoreError> {
    Ok(bson::from_document(record)?)
}
