use super::core::Collection;
use crate::document::StoredDocument;
use crate::types::DocumentId;

impl Collection {
    /// Appends a document. Re-inserting a known id replaces it in place.
    pub fn insert_document(&self, document: StoredDocument) -> DocumentId {
        let id = document.id;
        if self.update_document(&id, document.clone()) {
            return id;
        }
        let _guard = self.build_lock.read();
        let mut store = self.store.write();
        self.indexes.write().insert_all(&document.data, &id);
        let seq = store.next_seq;
        store.next_seq += 1;
        store.by_id.insert(id, seq);
        store.docs.insert(seq, document);
        log::trace!(target: "bookstore::engine", "insert {id} into {}", self.namespace());
        id
    }

    /// Replaces the stored document in place, keeping its position and id.
    pub fn update_document(&self, id: &DocumentId, mut new_document: StoredDocument) -> bool {
        let _guard = self.build_lock.read();
        new_document.id = *id;
        let mut store = self.store.write();
        let Some(seq) = store.by_id.get(id).copied() else {
            return false;
        };
        let mut indexes = self.indexes.write();
        if let Some(old) = store.docs.get(&seq) {
            indexes.remove_all(&old.data, id);
        }
        indexes.insert_all(&new_document.data, id);
        store.docs.insert(seq, new_document);
        true
    }

    pub fn delete_document(&self, id: &DocumentId) -> bool {
        let _guard = self.build_lock.read();
        let mut store = self.store.write();
        let Some(seq) = store.by_id.remove(id) else {
            return false;
        };
        if let Some(old) = store.docs.remove(&seq) {
            self.indexes.write().remove_all(&old.data, id);
        }
        true
    }

    /// Removes every document, leaving index definitions in place.
    pub fn clear(&self) -> usize {
        let _guard = self.build_lock.write();
        let mut store = self.store.write();
        let mut indexes = self.indexes.write();
        let n = store.docs.len();
        for (_, doc) in std::mem::take(&mut store.docs) {
            indexes.remove_all(&doc.data, &doc.id);
        }
        store.by_id.clear();
        n
    }

    /// All documents in natural (insertion) order.
    #[must_use]
    pub fn get_all_documents(&self) -> Vec<StoredDocument> {
        self.store.read().docs.values().cloned().collect()
    }

    /// The given documents in natural order; unknown ids are skipped.
    #[must_use]
    pub fn documents_for(&self, ids: &[DocumentId]) -> Vec<StoredDocument> {
        let store = self.store.read();
        let mut seqs: Vec<u64> = ids.iter().filter_map(|id| store.by_id.get(id).copied()).collect();
        seqs.sort_unstable();
        seqs.dedup();
        seqs.iter().filter_map(|s| store.docs.get(s).cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn natural_order_survives_updates_and_deletes() {
        let col = Collection::new("unit", "order");
        let ids: Vec<DocumentId> = (0..4)
            .map(|i| col.insert_document(StoredDocument::new(doc! {"n": i})))
            .collect();
        assert!(col.update_document(&ids[1], StoredDocument::new(doc! {"n": 10})));
        assert!(col.delete_document(&ids[2]));
        assert!(!col.delete_document(&ids[2]));
        let ns: Vec<i32> = col.get_all_documents().iter().map(|d| d.data.get_i32("n").unwrap()).collect();
        assert_eq!(ns, vec![0, 10, 3]);
        let kept: Vec<DocumentId> = col.get_all_documents().iter().map(|d| d.id).collect();
        assert_eq!(kept, vec![ids[0], ids[1], ids[3]]);
    }

    #[test]
    fn documents_for_sorts_by_position() {
        let col = Collection::new("unit", "subset");
        let ids: Vec<DocumentId> = (0..3)
            .map(|i| col.insert_document(StoredDocument::new(doc! {"n": i})))
            .collect();
        let out = col.documents_for(&[ids[2], ids[0], ids[2], DocumentId::new()]);
        assert_eq!(out.iter().map(|d| d.id).collect::<Vec<_>>(), vec![ids[0], ids[2]]);
    }

    #[test]
    fn clear_empties_but_keeps_indexes() {
        let col = Collection::new("unit", "clear");
        col.create_index(crate::index::IndexSpec::from_keys(&doc! {"n": 1}).unwrap()).unwrap();
        col.insert_document(StoredDocument::new(doc! {"n": 1}));
        assert_eq!(col.clear(), 1);
        assert!(col.is_empty());
        assert_eq!(col.index_names(), vec!["n_1".to_string()]);
        assert!(col.indexes.read().indexes["n_1"].map.is_empty());
    }
}
