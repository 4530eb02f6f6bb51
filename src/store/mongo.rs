use super::{DeleteOutcome, FindSpec, Store, UpdateOutcome};
use crate::errors::StoreError;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};

/// A MongoDB server reached through the official driver.
pub struct MongoStore {
    client: Client,
    db: Database,
    books: Collection<Document>,
}

impl MongoStore {
    /// Parses `uri` and builds a client. No round trip happens until the first operation.
    ///
    /// # Errors
    /// Returns `StoreError::Driver` when the URI cannot be parsed or resolved.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        let client = Client::with_options(options)?;
        let db = client.database(database);
        let books = db.collection::<Document>(collection);
        log::debug!("mongodb client ready for {database}.{collection}");
        Ok(Self { client, db, books })
    }
}

impl Store for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    fn namespace(&self) -> String {
        format!("{}.{}", self.db.name(), self.books.name())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! {"ping": 1})
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>, StoreError> {
        let mut action = self.books.find(filter);
        if let Some(projection) = spec.projection {
            action = action.projection(projection);
        }
        if let Some(sort) = spec.sort {
            action = action.sort(sort);
        }
        if let Some(skip) = spec.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = spec.limit {
            action = action.limit(limit);
        }
        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome, StoreError> {
        let res = self.books.update_one(filter, update).await?;
        Ok(UpdateOutcome { matched: res.matched_count, modified: res.modified_count })
    }

    async fn delete_one(&self, filter: Document) -> Result<DeleteOutcome, StoreError> {
        let res = self.books.delete_one(filter).await?;
        Ok(DeleteOutcome { deleted: res.deleted_count })
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError> {
        let cursor = self.books.aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn create_index(&self, keys: Document) -> Result<String, StoreError> {
        let model = IndexModel::builder().keys(keys).build();
        Ok(self.books.create_index(model).await?.index_name)
    }

    async fn explain_find(&self, filter: Document) -> Result<Document, StoreError> {
        let command = doc! {
            "explain": {"find": self.books.name(), "filter": filter},
            "verbosity": "executionStats",
        };
        Ok(self.db.run_command(command).await?)
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let res = self.books.insert_many(docs).await?;
        Ok(u64::try_from(res.inserted_ids.len()).unwrap_or(u64::MAX))
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        Ok(self.books.delete_many(doc! {}).await?.deleted_count)
    }

    async fn close(self) {
        self.client.shutdown().await;
        log::debug!("mongodb client shut down");
    }
}
