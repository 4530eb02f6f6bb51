use crate::document::types::Metadata;
use crate::types::DocumentId;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// A document as held by the embedded engine: user data plus bookkeeping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub data: Document,
    pub metadata: Metadata,
}

impl StoredDocument {
    /// Wraps `data`, assigning an `_id` first when the caller did not supply one.
    #[must_use]
    pub fn new(data: Document) -> Self {
        match data.get("_id") {
            Some(Bson::ObjectId(oid)) => {
                Self { id: DocumentId(*oid), data, metadata: Metadata::new() }
            }
            // Non-ObjectId `_id` values are kept as-is; the engine keys on its own id.
            Some(_) => Self { id: DocumentId::new(), data, metadata: Metadata::new() },
            None => {
                let oid = ObjectId::new();
                let mut with_id = Document::new();
                with_id.insert("_id", oid);
                for (k, v) in data {
                    with_id.insert(k, v);
                }
                Self { id: DocumentId(oid), data: with_id, metadata: Metadata::new() }
            }
        }
    }
}
