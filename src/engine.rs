use crate::collection::Collection;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process document engine: databases of named collections, all held in memory.
#[derive(Default)]
pub struct Engine {
    pub(crate) databases: RwLock<HashMap<String, HashMap<String, Arc<Collection>>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("databases", &self.databases.read().len()).finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collection, creating it (and its database) on first use.
    pub fn collection(&self, db: &str, name: &str) -> Arc<Collection> {
        if let Some(col) = self.get_collection(db, name) {
            return col;
        }
        let mut dbs = self.databases.write();
        dbs.entry(db.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!(target: "bookstore::engine", "created collection {db}.{name}");
                Arc::new(Collection::new(db, name))
            })
            .clone()
    }

    #[must_use]
    pub fn get_collection(&self, db: &str, name: &str) -> Option<Arc<Collection>> {
        self.databases.read().get(db).and_then(|cols| cols.get(name)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_is_created_once() {
        let e = Engine::new();
        let a = e.collection("plp_bookstore", "books");
        let b = e.collection("plp_bookstore", "books");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.namespace(), "plp_bookstore.books");
        assert!(e.get_collection("other", "books").is_none());
    }
}
