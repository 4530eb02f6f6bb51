//! Aggregation pipelines over an embedded collection.
mod expr;
mod stage;

pub use expr::{Expr, ExprOp, eval, parse_expr};
pub use stage::{AccKind, Accumulator, ProjectField, Stage, apply, parse_stage};

use crate::collection::Collection;
use crate::errors::StoreError;
use bson::Document;

/// Parses the whole pipeline up front, then streams the collection through it in natural order.
///
/// # Errors
/// Returns `StoreError::Query` for a malformed stage or an expression that fails at runtime.
pub fn run_pipeline(col: &Collection, pipeline: &[Document]) -> Result<Vec<Document>, StoreError> {
    let stages = pipeline.iter().map(parse_stage).collect::<Result<Vec<_>, _>>()?;
    let mut docs: Vec<Document> = col.get_all_documents().into_iter().map(|d| d.data).collect();
    for stage in &stages {
        docs = apply(stage, docs)?;
    }
    log::trace!(
        target: "bookstore::query",
        "aggregate on {} ran {} stage(s), {} result(s)",
        col.namespace(),
        stages.len(),
        docs.len()
    );
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StoredDocument;
    use bson::doc;

    fn books(rows: &[(&str, &str, f64)]) -> Collection {
        let col = Collection::new("unit", "books");
        for (author, genre, price) in rows {
            col.insert_document(StoredDocument::new(doc! {"author": *author, "genre": *genre, "price": *price}));
        }
        col
    }

    #[test]
    fn top_author_tie_goes_to_first_seen() {
        let col = books(&[("B", "x", 1.0), ("A", "x", 1.0), ("A", "y", 1.0), ("B", "y", 1.0)]);
        let out = run_pipeline(
            &col,
            &[
                doc! {"$group": {"_id": "$author", "count": {"$sum": 1}}},
                doc! {"$sort": {"count": -1}},
                doc! {"$limit": 1},
            ],
        )
        .unwrap();
        assert_eq!(out, vec![doc! {"_id": "B", "count": 2}]);
    }

    #[test]
    fn average_price_by_genre() {
        let col = books(&[("a", "Fiction", 10.0), ("b", "Fiction", 14.0), ("c", "Memoir", 15.0)]);
        let out = run_pipeline(&col, &[doc! {"$group": {"_id": "$genre", "avg_price": {"$avg": "$price"}}}]).unwrap();
        assert_eq!(
            out,
            vec![doc! {"_id": "Fiction", "avg_price": 12.0}, doc! {"_id": "Memoir", "avg_price": 15.0}]
        );
    }

    #[test]
    fn bad_stage_fails_before_running() {
        let col = books(&[]);
        assert!(run_pipeline(&col, &[doc! {"$match": {}}, doc! {"$out": "x"}]).is_err());
    }
}
