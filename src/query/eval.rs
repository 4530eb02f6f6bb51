use bson::{Bson, Document};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Projection, SortSpec};
use crate::num;
use crate::types::Order;

#[must_use]
pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => {
            values.iter().any(|x| matches_eq(get_path(doc, path), x))
        }
        Filter::Nin { path, values } => {
            !values.iter().any(|x| matches_eq(get_path(doc, path), x))
        }
        Filter::Cmp { path, op, value } => {
            let v = get_path(doc, path);
            match op {
                CmpOp::Eq => matches_eq(v, value),
                // `$ne` also matches documents lacking the field
                CmpOp::Ne => !matches_eq(v, value),
                CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte => {
                    v.is_some_and(|v| any_element(v, |x| matches_range(x, *op, value)))
                }
            }
        }
        #[cfg(feature = "regex")]
        Filter::Regex { path, pattern } => {
            matches!(get_path(doc, path), Some(Bson::String(s)) if pattern.0.is_match(s))
        }
    }
}

/// Equality where a missing field equals `null` and arrays match on any element.
fn matches_eq(v: Option<&Bson>, target: &Bson) -> bool {
    match v {
        None => matches!(target, Bson::Null),
        Some(v) => values_equal(v, target) || any_element(v, |x| values_equal(x, target)),
    }
}

fn any_element(v: &Bson, pred: impl Fn(&Bson) -> bool) -> bool {
    match v {
        Bson::Array(items) => items.iter().any(&pred),
        other => pred(other),
    }
}

/// Range comparisons only match values in the same type bracket as the operand.
fn matches_range(v: &Bson, op: CmpOp, target: &Bson) -> bool {
    if type_bracket(v) != type_bracket(target) {
        return false;
    }
    let ord = compare_bson(v, target);
    match op {
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Gte => ord != Ordering::Less,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Lte => ord != Ordering::Greater,
        CmpOp::Eq | CmpOp::Ne => false,
    }
}

/// Value equality with numeric values compared across int32/int64/double.
#[must_use]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if num::is_numeric(a) && num::is_numeric(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    a == b
}

/// Resolves a dotted path. Returns `None` when any segment is missing.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

pub fn compare_docs(a: &Document, b: &Document, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Total order over BSON values: by type bracket first, then by value within the bracket.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let (ra, rb) = (type_bracket(a), type_bracket(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        _ if num::is_numeric(a) && num::is_numeric(b) => {
            // Exact integer comparison first so large int64 values do not collapse in f64.
            if let (Some(x), Some(y)) = (num::as_i64(a), num::as_i64(b)) {
                return x.cmp(&y);
            }
            let x = num::as_f64(a).unwrap_or(f64::NAN);
            let y = num::as_f64(b).unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::Document(x), Bson::Document(y)) => compare_doc_values(x, y),
        (Bson::Array(x), Bson::Array(y)) => {
            for (p, q) in x.iter().zip(y) {
                let ord = compare_bson(p, q);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

fn compare_doc_values(x: &Document, y: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in x.iter().zip(y) {
        let ord = ka.cmp(kb).then_with(|| compare_bson(va, vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    x.len().cmp(&y.len())
}

/// Cross-type ordering used by sorts and range operators.
const fn type_bracket(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) | Bson::DbPointer(_) => 12,
        Bson::MaxKey => 255,
    }
}

#[must_use]
pub fn project(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::Include { fields, keep_id } => {
            let mut out = Document::new();
            if *keep_id && let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
            for f in fields {
                if let Some(v) = get_path(doc, f) {
                    insert_path(&mut out, f, v.clone());
                }
            }
            out
        }
        Projection::Exclude { fields } => {
            let mut out = doc.clone();
            for f in fields {
                remove_path(&mut out, f);
            }
            out
        }
    }
}

/// Inserts `value` at a dotted path, creating (or reusing) the intermediate documents.
pub(crate) fn insert_path(out: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            out.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(out.get(head), Some(Bson::Document(_))) {
                out.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = out.get_mut(head) {
                insert_path(child, rest, value);
            }
        }
    }
}

pub(crate) fn remove_path(out: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            out.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = out.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}
