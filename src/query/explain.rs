use crate::collection::Collection;
use crate::errors::StoreError;
use bson::{Document, doc};

use super::exec::find_with_stats;
use super::parse::parse_filter;
use super::types::FindOptions;

fn as_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Runs `filter` as a find and reports the plan and counters in the server's explain layout
/// (`queryPlanner.winningPlan`, `executionStats`).
///
/// # Errors
/// Returns `StoreError::Query` when the filter cannot be parsed.
pub fn explain_find(col: &Collection, filter_doc: &Document) -> Result<Document, StoreError> {
    let filter = parse_filter(filter_doc)?;
    let (_, stats) = find_with_stats(col, &filter, &FindOptions::default());
    let winning_plan = match &stats.index_name {
        Some(name) => {
            let key_pattern = col.indexes.read().key_pattern(name).unwrap_or_default();
            doc! {
                "stage": "FETCH",
                "filter": filter_doc.clone(),
                "inputStage": {
                    "stage": "IXSCAN",
                    "indexName": name.as_str(),
                    "keyPattern": key_pattern,
                },
            }
        }
        None => doc! { "stage": "COLLSCAN", "filter": filter_doc.clone() },
    };
    Ok(doc! {
        "queryPlanner": {
            "namespace": col.namespace(),
            "parsedQuery": filter_doc.clone(),
            "winningPlan": winning_plan,
        },
        "executionStats": {
            "executionSuccess": true,
            "nReturned": as_i64(stats.returned),
            "executionTimeMillis": as_i64(stats.elapsed_ms),
            "totalKeysExamined": as_i64(stats.keys_examined),
            "totalDocsExamined": as_i64(stats.docs_examined),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StoredDocument;
    use crate::engine::Engine;
    use crate::index::IndexSpec;

    fn books() -> std::sync::Arc<Collection> {
        let col = Engine::new().collection("plp_bookstore", "books");
        for title in ["1984", "Dune", "Educated"] {
            col.insert_document(StoredDocument::new(doc! {"title": title}));
        }
        col
    }

    #[test]
    fn collection_scan_without_index() {
        let col = books();
        let out = explain_find(&col, &doc! {"title": "Dune"}).unwrap();
        let plan = out.get_document("queryPlanner").unwrap().get_document("winningPlan").unwrap();
        assert_eq!(plan.get_str("stage").unwrap(), "COLLSCAN");
        let stats = out.get_document("executionStats").unwrap();
        assert_eq!(stats.get_i64("nReturned").unwrap(), 1);
        assert_eq!(stats.get_i64("totalDocsExamined").unwrap(), 3);
        assert_eq!(stats.get_i64("totalKeysExamined").unwrap(), 0);
    }

    #[test]
    fn index_scan_with_title_index() {
        let col = books();
        let spec = IndexSpec::from_keys(&doc! {"title": 1}).unwrap();
        col.create_index(spec).unwrap();
        let out = explain_find(&col, &doc! {"title": "Dune"}).unwrap();
        let input = out
            .get_document("queryPlanner")
            .unwrap()
            .get_document("winningPlan")
            .unwrap()
            .get_document("inputStage")
            .unwrap();
        assert_eq!(input.get_str("indexName").unwrap(), "title_1");
        assert_eq!(input.get_document("keyPattern").unwrap(), &doc! {"title": 1});
        let stats = out.get_document("executionStats").unwrap();
        assert_eq!(stats.get_i64("nReturned").unwrap(), 1);
        assert_eq!(stats.get_i64("totalDocsExamined").unwrap(), 1);
        assert_eq!(stats.get_i64("totalKeysExamined").unwrap(), 1);
        assert_eq!(
            out.get_document("queryPlanner").unwrap().get_str("namespace").unwrap(),
            "plp_bookstore.books"
        );
    }
}
