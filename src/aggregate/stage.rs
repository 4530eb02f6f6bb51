use super::expr::{Expr, eval, parse_expr};
use crate::errors::StoreError;
use crate::num;
use crate::query::{Filter, SortSpec, compare_bson, compare_docs, eval_filter, parse_filter, parse_sort};
use bson::{Bson, Document};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccKind {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub kind: AccKind,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Group { id: Expr, fields: Vec<(String, Accumulator)> },
    Sort(Vec<SortSpec>),
    Limit(usize),
    Skip(usize),
    Project(Vec<(String, ProjectField)>),
    Count(String),
}

fn stage_arg<'a>(name: &str, v: &'a Bson) -> Result<&'a Document, StoreError> {
    v.as_document().ok_or_else(|| StoreError::query(format!("{name} requires a document")))
}

fn count_arg(name: &str, v: &Bson) -> Result<usize, StoreError> {
    let n = num::as_i64(v)
        .or_else(|| match v {
            Bson::Double(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        })
        .ok_or_else(|| StoreError::query(format!("{name} requires an integer")))?;
    usize::try_from(n).map_err(|_| StoreError::query(format!("{name} must not be negative")))
}

fn parse_accumulator(field: &str, v: &Bson) -> Result<Accumulator, StoreError> {
    let d = v
        .as_document()
        .filter(|d| d.len() == 1)
        .ok_or_else(|| StoreError::query(format!("group field {field} must be a single accumulator")))?;
    let (op, arg) = d.iter().next().ok_or_else(|| StoreError::query("empty accumulator"))?;
    let kind = match op.as_str() {
        "$sum" => AccKind::Sum,
        "$avg" => AccKind::Avg,
        "$min" => AccKind::Min,
        "$max" => AccKind::Max,
        "$first" => AccKind::First,
        "$last" => AccKind::Last,
        other => return Err(StoreError::query(format!("unknown accumulator {other}"))),
    };
    Ok(Accumulator { kind, expr: parse_expr(arg)? })
}

fn parse_project(spec: &Document) -> Result<Vec<(String, ProjectField)>, StoreError> {
    let mut out = Vec::with_capacity(spec.len());
    for (k, v) in spec {
        let field = match v {
            Bson::Boolean(true) => ProjectField::Include,
            Bson::Boolean(false) => ProjectField::Exclude,
            n if num::is_numeric(n) => {
                if num::as_f64(n).is_some_and(|f| f == 0.0) {
                    ProjectField::Exclude
                } else {
                    ProjectField::Include
                }
            }
            other => ProjectField::Computed(parse_expr(other)?),
        };
        out.push((k.clone(), field));
    }
    let excludes_other = out.iter().any(|(k, f)| *f == ProjectField::Exclude && k != "_id");
    let includes = out.iter().any(|(_, f)| *f != ProjectField::Exclude);
    if excludes_other && includes {
        return Err(StoreError::query("$project cannot mix inclusion and exclusion"));
    }
    Ok(out)
}

/// Parses one pipeline stage document such as `{"$limit": 5}`.
///
/// # Errors
/// Returns `StoreError::Query` for unknown stages or malformed arguments.
pub fn parse_stage(stage: &Document) -> Result<Stage, StoreError> {
    if stage.len() != 1 {
        return Err(StoreError::query("a pipeline stage must have exactly one field"));
    }
    let Some((name, arg)) = stage.iter().next() else {
        return Err(StoreError::query("empty pipeline stage"));
    };
    match name.as_str() {
        "$match" => Ok(Stage::Match(parse_filter(stage_arg(name, arg)?)?)),
        "$group" => {
            let spec = stage_arg(name, arg)?;
            let id = spec.get("_id").ok_or_else(|| StoreError::query("$group requires _id"))?;
            let fields = spec
                .iter()
                .filter(|(k, _)| k.as_str() != "_id")
                .map(|(k, v)| Ok((k.clone(), parse_accumulator(k, v)?)))
                .collect::<Result<Vec<_>, StoreError>>()?;
            Ok(Stage::Group { id: parse_expr(id)?, fields })
        }
        "$sort" => {
            let keys = parse_sort(stage_arg(name, arg)?)?;
            if keys.is_empty() {
                return Err(StoreError::query("$sort requires at least one key"));
            }
            Ok(Stage::Sort(keys))
        }
        "$limit" => match count_arg(name, arg)? {
            0 => Err(StoreError::query("$limit must be positive")),
            n => Ok(Stage::Limit(n)),
        },
        "$skip" => Ok(Stage::Skip(count_arg(name, arg)?)),
        "$project" => Ok(Stage::Project(parse_project(stage_arg(name, arg)?)?)),
        "$count" => match arg {
            Bson::String(s) if !s.is_empty() && !s.starts_with('$') && !s.contains('.') => {
                Ok(Stage::Count(s.clone()))
            }
            _ => Err(StoreError::query("$count requires a plain field name")),
        },
        other => Err(StoreError::query(format!("unknown pipeline stage {other}"))),
    }
}

/// Running state of one accumulator within one group.
enum AccState {
    Sum(Bson),
    Avg { total: f64, n: u64 },
    Pick(Option<Bson>),
}

impl AccState {
    fn new(kind: AccKind) -> Self {
        match kind {
            AccKind::Sum => Self::Sum(Bson::Int32(0)),
            AccKind::Avg => Self::Avg { total: 0.0, n: 0 },
            AccKind::Min | AccKind::Max | AccKind::First | AccKind::Last => Self::Pick(None),
        }
    }

    fn feed(&mut self, kind: AccKind, v: Bson) {
        match self {
            Self::Sum(acc) => {
                if let Some(next) = num::add(acc, &v) {
                    *acc = next;
                }
            }
            Self::Avg { total, n } => {
                if let Some(f) = num::as_f64(&v) {
                    *total += f;
                    *n += 1;
                }
            }
            Self::Pick(cur) => match kind {
                AccKind::First if cur.is_none() => *cur = Some(v),
                AccKind::Last => *cur = Some(v),
                // Min and max skip null and missing values.
                AccKind::Min | AccKind::Max if !matches!(v, Bson::Null) => {
                    let want = if kind == AccKind::Min { Ordering::Less } else { Ordering::Greater };
                    if cur.as_ref().is_none_or(|c| compare_bson(&v, c) == want) {
                        *cur = Some(v);
                    }
                }
                _ => {}
            },
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Bson {
        match self {
            Self::Sum(v) => v,
            Self::Avg { n: 0, .. } => Bson::Null,
            Self::Avg { total, n } => Bson::Double(total / n as f64),
            Self::Pick(v) => v.unwrap_or(Bson::Null),
        }
    }
}

fn group(
    docs: Vec<Document>,
    id: &Expr,
    fields: &[(String, Accumulator)],
) -> Result<Vec<Document>, StoreError> {
    // Groups keep first-seen order.
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for doc in &docs {
        let key = eval(id, doc)?;
        let pos = match groups.iter().position(|(k, _)| compare_bson(k, &key) == Ordering::Equal) {
            Some(p) => p,
            None => {
                groups.push((key, fields.iter().map(|(_, a)| AccState::new(a.kind)).collect()));
                groups.len() - 1
            }
        };
        for ((_, acc), state) in fields.iter().zip(groups[pos].1.iter_mut()) {
            state.feed(acc.kind, eval(&acc.expr, doc)?);
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _), state) in fields.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}

fn project_doc(doc: &Document, spec: &[(String, ProjectField)]) -> Result<Document, StoreError> {
    let exclusion = spec.iter().all(|(_, f)| *f == ProjectField::Exclude);
    if exclusion {
        let mut out = doc.clone();
        for (k, _) in spec {
            crate::query::remove_path(&mut out, k);
        }
        return Ok(out);
    }
    let mut out = Document::new();
    let drop_id = spec.iter().any(|(k, f)| k == "_id" && *f == ProjectField::Exclude);
    let id_listed = spec.iter().any(|(k, _)| k == "_id");
    if !drop_id && !id_listed && let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for (k, f) in spec {
        match f {
            ProjectField::Include => {
                if let Some(v) = crate::query::get_path(doc, k) {
                    crate::query::insert_path(&mut out, k, v.clone());
                }
            }
            ProjectField::Computed(e) => {
                crate::query::insert_path(&mut out, k, eval(e, doc)?);
            }
            ProjectField::Exclude => {}
        }
    }
    Ok(out)
}

/// Applies one stage to the documents flowing through the pipeline.
///
/// # Errors
/// Returns `StoreError::Query` when an expression fails on some document.
pub fn apply(stage: &Stage, docs: Vec<Document>) -> Result<Vec<Document>, StoreError> {
    Ok(match stage {
        Stage::Match(f) => docs.into_iter().filter(|d| eval_filter(d, f)).collect(),
        Stage::Group { id, fields } => group(docs, id, fields)?,
        Stage::Sort(keys) => {
            let mut docs = docs;
            docs.sort_by(|a, b| compare_docs(a, b, keys));
            docs
        }
        Stage::Limit(n) => docs.into_iter().take(*n).collect(),
        Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
        Stage::Project(spec) => docs.iter().map(|d| project_doc(d, spec)).collect::<Result<_, _>>()?,
        Stage::Count(name) => {
            if docs.is_empty() {
                Vec::new()
            } else {
                let n = i32::try_from(docs.len()).map_or(Bson::Int64(i64::MAX), Bson::Int32);
                let mut out = Document::new();
                out.insert(name.clone(), n);
                vec![out]
            }
        }
    })
}
