use super::core::Collection;
use crate::errors::StoreError;
use crate::index::IndexSpec;
use std::time::Instant;

impl Collection {
    /// Creates an index and builds it from the current documents. Returns the index name;
    /// creating an identical index again is a no-op.
    ///
    /// # Errors
    /// Returns `StoreError::IndexConflict` when the name is taken by a different key pattern.
    pub fn create_index(&self, spec: IndexSpec) -> Result<String, StoreError> {
        let _wguard = self.build_lock.write();
        let name = spec.name();
        let mut mgr = self.indexes.write();
        if !mgr.create_index(spec)? {
            return Ok(name);
        }
        let start = Instant::now();
        let store = self.store.read();
        if let Some(idx) = mgr.indexes.get_mut(&name) {
            for doc in store.docs.values() {
                idx.insert(&doc.data, &doc.id);
            }
        }
        log::debug!(
            target: "bookstore::engine",
            "built index {name} on {} over {} docs in {}ms",
            self.namespace(),
            store.docs.len(),
            start.elapsed().as_millis()
        );
        Ok(name)
    }

    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.read().names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StoredDocument;
    use bson::doc;

    #[test]
    fn build_covers_existing_documents() {
        let col = Collection::new("unit", "idx");
        for year in [1949, 2011, 2018] {
            col.insert_document(StoredDocument::new(doc! {"published_year": year}));
        }
        let spec = IndexSpec::from_keys(&doc! {"published_year": 1}).unwrap();
        assert_eq!(col.create_index(spec.clone()).unwrap(), "published_year_1");
        assert_eq!(col.create_index(spec).unwrap(), "published_year_1");
        let scan = col
            .indexes
            .read()
            .lookup("published_year", crate::query::CmpOp::Gt, &bson::Bson::Int32(2010))
            .unwrap();
        assert_eq!(scan.ids.len(), 2);
        assert_eq!(col.index_names(), vec!["published_year_1".to_string()]);
    }
}
