use crate::document::StoredDocument;
use crate::index::IndexManager;
use crate::types::DocumentId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Documents keyed by insertion sequence so scans yield natural order.
#[derive(Debug, Default)]
pub(crate) struct DocStore {
    pub(crate) docs: BTreeMap<u64, StoredDocument>,
    pub(crate) by_id: HashMap<DocumentId, u64>,
    pub(crate) next_seq: u64,
}

pub struct Collection {
    db: String,
    name: String,
    pub(crate) store: RwLock<DocStore>,
    pub indexes: RwLock<IndexManager>,
    pub(crate) build_lock: RwLock<()>,
}

impl Collection {
    #[must_use]
    pub fn new(db: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            name: name.into(),
            store: RwLock::new(DocStore::default()),
            indexes: RwLock::new(IndexManager::new()),
            build_lock: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `db.collection`, as reported by explain.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.db, self.name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
