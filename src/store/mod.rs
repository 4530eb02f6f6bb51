//! The seam between the runner and a document store.
//!
//! One connection is one [`Store`] value. [`Store::close`] takes `self`, so a store is closed at
//! most once and cannot be used afterwards.
mod embedded;
mod mongo;

pub use embedded::EmbeddedStore;
pub use mongo::MongoStore;

use crate::errors::StoreError;
use bson::Document;

/// Options of a find: projection and sort as key documents, plus paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindSpec {
    #[must_use]
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

/// Operations the runner and the seeder need from a backend. Each call is one awaited round trip.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Short backend label for console and log lines.
    fn backend(&self) -> &'static str;

    /// `db.collection` this store operates on.
    fn namespace(&self) -> String;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>, StoreError>;

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome, StoreError>;

    async fn delete_one(&self, filter: Document) -> Result<DeleteOutcome, StoreError>;

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError>;

    /// Creates an index from a key document and returns its name, e.g. `title_1`.
    async fn create_index(&self, keys: Document) -> Result<String, StoreError>;

    /// Explains a find with `executionStats` verbosity.
    async fn explain_find(&self, filter: Document) -> Result<Document, StoreError>;

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError>;

    /// Deletes every document in the collection.
    async fn clear(&self) -> Result<u64, StoreError>;

    /// Releases the connection. Never fails observably.
    async fn close(self)
    where
        Self: Sized;
}
