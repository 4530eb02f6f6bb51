use crate::errors::StoreError;
use crate::types::Order;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

#[cfg(feature = "regex")]
use super::types::Pattern;
use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, MAX_UPDATE_FIELDS,
    Projection, SortSpec, UpdateDoc,
};

/// Parses a filter document such as `{"genre": "Fiction", "published_year": {"$gt": 2015}}`.
///
/// Top-level keys are ANDed. A field whose value is a document starting with a `$` key is an
/// operator expression; any other value is an equality match.
///
/// # Errors
/// Returns `StoreError::Query` for unknown operators or malformed operands.
pub fn parse_filter(doc: &Document) -> Result<Filter, StoreError> {
    let mut clauses = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        clauses.push(parse_clause(key, value)?);
    }
    Ok(collapse(clauses))
}

fn collapse(mut clauses: Vec<Filter>) -> Filter {
    match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    }
}

fn parse_clause(key: &str, value: &Bson) -> Result<Filter, StoreError> {
    match key {
        "$and" => Ok(Filter::And(parse_filter_list(key, value)?)),
        "$or" => Ok(Filter::Or(parse_filter_list(key, value)?)),
        "$nor" => Ok(Filter::Nor(parse_filter_list(key, value)?)),
        k if k.starts_with('$') => Err(StoreError::query(format!("unknown top-level operator: {k}"))),
        path => match value {
            Bson::Document(ops) if is_operator_doc(ops) => parse_field_ops(path, ops),
            other => Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: other.clone() }),
        },
    }
}

fn parse_filter_list(op: &str, value: &Bson) -> Result<Vec<Filter>, StoreError> {
    let Bson::Array(items) = value else {
        return Err(StoreError::query(format!("{op} requires an array")));
    };
    if items.is_empty() {
        return Err(StoreError::query(format!("{op} requires a non-empty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(StoreError::query(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn parse_field_ops(path: &str, ops: &Document) -> Result<Filter, StoreError> {
    let mut clauses = Vec::with_capacity(ops.len());
    #[cfg(feature = "regex")]
    let case_insensitive = ops.get_str("$options").is_ok_and(|o| o.contains('i'));
    for (op, operand) in ops {
        let cmp = |op: CmpOp| Filter::Cmp { path: path.to_string(), op, value: operand.clone() };
        let clause = match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$ne" => cmp(CmpOp::Ne),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$in" => Filter::In { path: path.to_string(), values: operand_list(op, operand)? },
            "$nin" => Filter::Nin { path: path.to_string(), values: operand_list(op, operand)? },
            "$exists" => Filter::Exists { path: path.to_string(), exists: truthy(operand) },
            "$not" => match operand {
                Bson::Document(inner) if is_operator_doc(inner) => {
                    Filter::Not(Box::new(parse_field_ops(path, inner)?))
                }
                _ => return Err(StoreError::query("$not requires an operator document")),
            },
            #[cfg(feature = "regex")]
            "$regex" => {
                let pattern = match operand {
                    Bson::String(pattern) => Pattern::compile(pattern, case_insensitive)?,
                    Bson::RegularExpression(re) => {
                        Pattern::compile(&re.pattern, case_insensitive || re.options.contains('i'))?
                    }
                    _ => return Err(StoreError::query("$regex requires a string pattern")),
                };
                Filter::Regex { path: path.to_string(), pattern }
            }
            #[cfg(feature = "regex")]
            "$options" => continue,
            other => return Err(StoreError::query(format!("unknown operator: {other}"))),
        };
        clauses.push(clause);
    }
    Ok(collapse(clauses))
}

fn operand_list(op: &str, operand: &Bson) -> Result<Vec<Bson>, StoreError> {
    match operand {
        Bson::Array(values) => {
            ensure_within(op, values.len(), MAX_IN_SET)?;
            Ok(values.clone())
        }
        _ => Err(StoreError::query(format!("{op} requires an array"))),
    }
}

fn ensure_within(what: &str, len: usize, max: usize) -> Result<(), StoreError> {
    if len > max {
        return Err(StoreError::query(format!("{what} exceeds {max} entries")));
    }
    Ok(())
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Serde-facing shape of an update document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDocSerde {
    #[serde(default, rename = "$set")]
    pub set: Option<Document>,
    #[serde(default, rename = "$inc")]
    pub inc: Option<Document>,
    #[serde(default, rename = "$unset")]
    pub unset: Option<Document>,
}

impl TryFrom<UpdateDocSerde> for UpdateDoc {
    type Error = StoreError;
    fn try_from(us: UpdateDocSerde) -> Result<Self, Self::Error> {
        let mut out = Self::default();
        if let Some(setd) = us.set {
            ensure_within("$set", setd.len(), MAX_UPDATE_FIELDS)?;
            out.set = setd.into_iter().collect();
        }
        if let Some(incd) = us.inc {
            ensure_within("$inc", incd.len(), MAX_UPDATE_FIELDS)?;
            for (k, v) in incd {
                if !crate::num::is_numeric(&v) {
                    return Err(StoreError::query("$inc requires numeric"));
                }
                out.inc.push((k, v));
            }
        }
        if let Some(unset) = us.unset {
            ensure_within("$unset", unset.len(), MAX_UPDATE_FIELDS)?;
            out.unset = unset.into_iter().map(|(k, _)| k).collect();
        }
        if out.set.is_empty() && out.inc.is_empty() && out.unset.is_empty() {
            return Err(StoreError::query("update document contains no operators"));
        }
        Ok(out)
    }
}

/// # Errors
/// Returns an error if the document uses anything besides `$set`, `$inc` and `$unset`.
pub fn parse_update(doc: &Document) -> Result<UpdateDoc, StoreError> {
    let us: UpdateDocSerde = bson::from_document(doc.clone())
        .map_err(|e| StoreError::query(format!("invalid update document: {e}")))?;
    UpdateDoc::try_from(us)
}

/// Parses `{"price": 1, "title": -1}` into sort keys, in document order.
///
/// # Errors
/// Returns `StoreError::Query` when a direction is not `1` or `-1`.
pub fn parse_sort(doc: &Document) -> Result<Vec<SortSpec>, StoreError> {
    ensure_within("sort", doc.len(), MAX_SORT_FIELDS)?;
    doc.iter()
        .map(|(field, dir)| {
            Order::from_bson(dir)
                .map(|order| SortSpec { field: field.clone(), order })
                .ok_or_else(|| StoreError::query(format!("invalid sort direction for {field}")))
        })
        .collect()
}

/// Parses an inclusion or exclusion projection. `_id` may be suppressed in either style.
///
/// # Errors
/// Returns `StoreError::Query` when inclusion and exclusion are mixed.
pub fn parse_projection(doc: &Document) -> Result<Projection, StoreError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;
    ensure_within("projection", doc.len(), MAX_PROJECTION_FIELDS)?;
    for (field, flag) in doc {
        let on = truthy(flag);
        if field == "_id" {
            keep_id = on;
            continue;
        }
        if on { include.push(field.clone()) } else { exclude.push(field.clone()) }
    }
    match (include.is_empty(), exclude.is_empty()) {
        (false, false) => Err(StoreError::query("cannot mix inclusion and exclusion in projection")),
        (true, false) => {
            if !keep_id {
                exclude.push("_id".to_string());
            }
            Ok(Projection::Exclude { fields: exclude })
        }
        (false, true) => Ok(Projection::Include { fields: include, keep_id }),
        (true, true) => Ok(if keep_id {
            Projection::Exclude { fields: Vec::new() }
        } else {
            Projection::Exclude { fields: vec!["_id".to_string()] }
        }),
    }
}
