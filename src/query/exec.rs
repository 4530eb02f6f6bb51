use crate::collection::Collection;
use crate::document::StoredDocument;
use crate::errors::StoreError;
use crate::index::IndexScan;
use crate::num;
use bson::{Bson, Document};
use std::time::Instant;

use super::eval::{compare_docs, eval_filter, project};
use super::types::{CmpOp, DeleteReport, Filter, FindOptions, UpdateDoc, UpdateReport};

/// Counters describing how a find was executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecStats {
    pub index_name: Option<String>,
    pub keys_examined: u64,
    pub docs_examined: u64,
    pub returned: u64,
    pub elapsed_ms: u64,
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Picks index candidates for `filter`, or `None` when a collection scan is required.
///
/// Only a comparison on an index's leading field is eligible; inside `$and` the first eligible
/// clause wins.
pub fn plan_candidates(col: &Collection, filter: &Filter) -> Option<IndexScan> {
    match filter {
        Filter::Cmp { op: CmpOp::Ne, .. } => None,
        Filter::Cmp { path, op, value } => col.indexes.read().lookup(path, *op, value),
        Filter::And(fs) => fs.iter().find_map(|f| plan_candidates(col, f)),
        _ => None,
    }
}

/// Candidate documents in natural (insertion) order plus the scan that produced them.
fn candidates(col: &Collection, filter: &Filter) -> (Vec<StoredDocument>, Option<IndexScan>) {
    match plan_candidates(col, filter) {
        Some(scan) => (col.documents_for(&scan.ids), Some(scan)),
        None => (col.get_all_documents(), None),
    }
}

#[must_use]
pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> Vec<Document> {
    find_with_stats(col, filter, opts).0
}

/// Filter, then stable sort, then skip/limit, then projection.
pub fn find_with_stats(
    col: &Collection,
    filter: &Filter,
    opts: &FindOptions,
) -> (Vec<Document>, ExecStats) {
    let start = Instant::now();
    let (cands, scan) = candidates(col, filter);
    let docs_examined = to_u64(cands.len());
    let mut docs: Vec<Document> =
        cands.into_iter().filter(|d| eval_filter(&d.data, filter)).map(|d| d.data).collect();

    if !opts.sort.is_empty() {
        docs.sort_by(|a, b| compare_docs(a, b, &opts.sort));
    }

    let skip = opts.skip.map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));
    // A limit of zero means "no limit"; a negative limit behaves like its absolute value.
    let limit = match opts.limit {
        None | Some(0) => usize::MAX,
        Some(n) => usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX),
    };
    let mut docs: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();

    if let Some(p) = &opts.projection {
        for d in &mut docs {
            *d = project(d, p);
        }
    }

    let stats = ExecStats {
        index_name: scan.as_ref().map(|s| s.index_name.clone()),
        keys_examined: scan.as_ref().map_or(0, |s| s.keys_examined),
        docs_examined,
        returned: to_u64(docs.len()),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    log::trace!(
        target: "bookstore::query",
        "{{\"op\":\"find\",\"collection\":\"{}\",\"duration_ms\":{},\"used_index\":{},\"docs_examined\":{},\"result_count\":{}}}",
        col.name(),
        stats.elapsed_ms,
        stats.index_name.is_some(),
        stats.docs_examined,
        stats.returned
    );
    (docs, stats)
}

/// Updates the first matching document in natural order.
///
/// # Errors
/// Returns `StoreError::Query` when the update cannot be applied to the matched document.
pub fn update_one(
    col: &Collection,
    filter: &Filter,
    update: &UpdateDoc,
) -> Result<UpdateReport, StoreError> {
    let (cands, _) = candidates(col, filter);
    let Some(mut doc) = cands.into_iter().find(|d| eval_filter(&d.data, filter)) else {
        return Ok(UpdateReport::default());
    };
    let id = doc.id;
    let changed = apply_update(&mut doc, update)?;
    if changed {
        col.update_document(&id, doc);
    }
    Ok(UpdateReport { matched: 1, modified: u64::from(changed) })
}

#[must_use]
pub fn delete_one(col: &Collection, filter: &Filter) -> DeleteReport {
    let (cands, _) = candidates(col, filter);
    cands.into_iter().find(|d| eval_filter(&d.data, filter)).map_or_else(DeleteReport::default, |d| {
        DeleteReport { deleted: u64::from(col.delete_document(&d.id)) }
    })
}

/// Applies `$set`, `$inc` and `$unset` in that order. Returns whether the data changed.
///
/// # Errors
/// Returns `StoreError::Query` when a path crosses a non-document value or `$inc` targets a
/// non-numeric field.
pub fn apply_update(doc: &mut StoredDocument, upd: &UpdateDoc) -> Result<bool, StoreError> {
    fn parent_of<'a>(
        root: &'a mut Document,
        path: &str,
        create: bool,
    ) -> Result<Option<(&'a mut Document, String)>, StoreError> {
        let mut cur = root;
        let mut segs = path.split('.').peekable();
        while let Some(seg) = segs.next() {
            if segs.peek().is_none() {
                return Ok(Some((cur, seg.to_string())));
            }
            if !cur.contains_key(seg) {
                if !create {
                    return Ok(None);
                }
                cur.insert(seg.to_string(), Document::new());
            }
            cur = match cur.get_mut(seg) {
                Some(Bson::Document(d)) => d,
                _ if create => {
                    return Err(StoreError::query(format!(
                        "cannot create field in non-document element at {seg}"
                    )));
                }
                _ => return Ok(None),
            };
        }
        Ok(None)
    }
    fn set_path(root: &mut Document, path: &str, value: Bson) -> Result<bool, StoreError> {
        let Some((parent, last)) = parent_of(root, path, true)? else {
            return Ok(false);
        };
        let old = parent.insert(last, value.clone());
        Ok(old.as_ref() != Some(&value))
    }
    fn inc_path(root: &mut Document, path: &str, by: &Bson) -> Result<bool, StoreError> {
        let current = super::eval::get_path(root, path).cloned().unwrap_or(Bson::Int32(0));
        let next = num::add(&current, by).ok_or_else(|| {
            StoreError::query(format!("cannot apply $inc to non-numeric field {path}"))
        })?;
        set_path(root, path, next)
    }
    fn unset_path(root: &mut Document, path: &str) -> Result<bool, StoreError> {
        Ok(match parent_of(root, path, false)? {
            Some((parent, last)) => parent.remove(&last).is_some(),
            None => false,
        })
    }

    if upd.set.iter().any(|(k, _)| k == "_id") {
        return Err(StoreError::query("the _id field is immutable"));
    }
    let mut data = doc.data.clone();
    let mut changed = false;
    for (k, v) in &upd.set {
        changed |= set_path(&mut data, k, v.clone())?;
    }
    for (k, by) in &upd.inc {
        changed |= inc_path(&mut data, k, by)?;
    }
    for k in &upd.unset {
        changed |= unset_path(&mut data, k)?;
    }
    if changed {
        doc.data = data;
        doc.metadata.touch();
    }
    Ok(changed)
}
