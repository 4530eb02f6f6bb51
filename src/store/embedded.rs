use super::{DeleteOutcome, FindSpec, Store, UpdateOutcome};
use crate::aggregate::run_pipeline;
use crate::collection::Collection;
use crate::document::StoredDocument;
use crate::engine::Engine;
use crate::errors::StoreError;
use crate::index::IndexSpec;
use crate::query::{self, FindOptions};
use bson::Document;
use std::sync::Arc;

/// A store backed by the in-process [`Engine`]. Cloning the engine handle before `close` keeps
/// the data reachable afterwards.
pub struct EmbeddedStore {
    engine: Arc<Engine>,
    col: Arc<Collection>,
}

impl EmbeddedStore {
    #[must_use]
    pub fn new(engine: Arc<Engine>, database: &str, collection: &str) -> Self {
        let col = engine.collection(database, collection);
        Self { engine, col }
    }

    /// A store over a fresh, empty engine.
    #[must_use]
    pub fn open(database: &str, collection: &str) -> Self {
        Self::new(Arc::new(Engine::new()), database, collection)
    }

    #[must_use]
    pub fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }

    #[must_use]
    pub fn collection(&self) -> &Collection {
        &self.col
    }
}

fn find_options(spec: FindSpec) -> Result<FindOptions, StoreError> {
    Ok(FindOptions {
        projection: spec.projection.as_ref().map(query::parse_projection).transpose()?,
        sort: spec.sort.as_ref().map(query::parse_sort).transpose()?.unwrap_or_default(),
        skip: spec.skip,
        limit: spec.limit,
    })
}

impl Store for EmbeddedStore {
    fn backend(&self) -> &'static str {
        "embedded"
    }

    fn namespace(&self) -> String {
        self.col.namespace()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>, StoreError> {
        let filter = query::parse_filter(&filter)?;
        Ok(query::find_docs(&self.col, &filter, &find_options(spec)?))
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome, StoreError> {
        let filter = query::parse_filter(&filter)?;
        let update = query::parse_update(&update)?;
        let report = query::update_one(&self.col, &filter, &update)?;
        Ok(UpdateOutcome { matched: report.matched, modified: report.modified })
    }

    async fn delete_one(&self, filter: Document) -> Result<DeleteOutcome, StoreError> {
        let filter = query::parse_filter(&filter)?;
        Ok(DeleteOutcome { deleted: query::delete_one(&self.col, &filter).deleted })
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError> {
        run_pipeline(&self.col, &pipeline)
    }

    async fn create_index(&self, keys: Document) -> Result<String, StoreError> {
        self.col.create_index(IndexSpec::from_keys(&keys)?)
    }

    async fn explain_find(&self, filter: Document) -> Result<Document, StoreError> {
        query::explain_find(&self.col, &filter)
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError> {
        let mut n = 0u64;
        for doc in docs {
            self.col.insert_document(StoredDocument::new(doc));
            n += 1;
        }
        Ok(n)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        Ok(u64::try_from(self.col.clear()).unwrap_or(u64::MAX))
    }

    async fn close(self) {
        log::debug!("embedded store for {} closed", self.col.namespace());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn find_applies_spec() {
        let store = EmbeddedStore::open("unit", "books");
        store
            .insert_many(vec![
                doc! {"title": "b", "price": 2.0},
                doc! {"title": "a", "price": 1.0},
                doc! {"title": "c", "price": 3.0},
            ])
            .await
            .unwrap();
        let spec = FindSpec::default()
            .projection(doc! {"title": 1, "_id": 0})
            .sort(doc! {"price": -1})
            .skip(1)
            .limit(1);
        assert_eq!(store.find(doc! {}, spec).await.unwrap(), vec![doc! {"title": "b"}]);
    }

    #[tokio::test]
    async fn malformed_requests_are_query_errors() {
        let store = EmbeddedStore::open("unit", "books");
        let bad_filter = store.find(doc! {"price": {"$near": 1}}, FindSpec::default()).await;
        assert!(matches!(bad_filter, Err(StoreError::Query(_))));
        let bad_update = store.update_one(doc! {}, doc! {"$rename": {"a": "b"}}).await;
        assert!(bad_update.is_err());
        let bad_sort = store.find(doc! {}, FindSpec::default().sort(doc! {"price": 2})).await;
        assert!(bad_sort.is_err());
    }

    #[tokio::test]
    async fn data_outlives_close_through_engine_handle() {
        let store = EmbeddedStore::open("unit", "books");
        store.insert_many(vec![doc! {"title": "Dune"}]).await.unwrap();
        let engine = store.engine();
        store.close().await;
        let again = EmbeddedStore::new(engine, "unit", "books");
        assert_eq!(again.collection().len(), 1);
        assert_eq!(again.clear().await.unwrap(), 1);
    }
}
