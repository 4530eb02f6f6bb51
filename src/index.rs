use crate::errors::StoreError;
use crate::query::{CmpOp, get_path};
use crate::types::{DocumentId, Order};
use bson::{Bson, Document};
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet};

/// Key pattern of an ordered index: one or more fields, each with a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<(String, Order)>,
}

impl IndexSpec {
    /// Parses a key document such as `{"author": 1, "published_year": -1}`.
    ///
    /// # Errors
    /// Returns `StoreError::Query` for an empty pattern or a direction other than `1` / `-1`.
    pub fn from_keys(keys: &Document) -> Result<Self, StoreError> {
        if keys.is_empty() {
            return Err(StoreError::query("index key pattern must not be empty"));
        }
        let keys = keys
            .iter()
            .map(|(field, dir)| {
                Order::from_bson(dir)
                    .map(|o| (field.clone(), o))
                    .ok_or_else(|| StoreError::query(format!("invalid index direction for {field}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }

    /// Server-style default name: `field_dir` pairs joined by `_`, e.g. `author_1_published_year_-1`.
    #[must_use]
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(f, o)| format!("{f}_{}", o.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    #[must_use]
    pub fn key_pattern(&self) -> Document {
        let mut out = Document::new();
        for (f, o) in &self.keys {
            out.insert(f.clone(), o.as_i32());
        }
        out
    }

    fn leading_field(&self) -> &str {
        self.keys.first().map_or("", |(f, _)| f.as_str())
    }
}

/// One component of an index key. Variant order follows the cross-type sort order, and all
/// numbers share one variant so `2015` and `2015.0` land on the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Null,
    Num(OrderedFloat<f64>),
    Str(String),
    Oid([u8; 12]),
    Bool(bool),
    Date(i64),
}

impl IndexKey {
    /// Missing fields index as `Null`; values with no key form are not indexable.
    #[must_use]
    pub fn from_bson(v: Option<&Bson>) -> Option<Self> {
        match v {
            None | Some(Bson::Null) => Some(Self::Null),
            Some(v) => match v {
                Bson::String(s) => Some(Self::Str(s.clone())),
                Bson::Boolean(b) => Some(Self::Bool(*b)),
                Bson::ObjectId(o) => Some(Self::Oid(o.bytes())),
                Bson::DateTime(d) => Some(Self::Date(d.timestamp_millis())),
                other => crate::num::as_f64(other).map(|f| Self::Num(OrderedFloat(f))),
            },
        }
    }

    /// Smallest key in the same type bracket.
    fn bracket_floor(&self) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Num(_) => Self::Num(OrderedFloat(f64::NEG_INFINITY)),
            Self::Str(_) => Self::Str(String::new()),
            Self::Oid(_) => Self::Oid([0; 12]),
            Self::Bool(_) => Self::Bool(false),
            Self::Date(_) => Self::Date(i64::MIN),
        }
    }

    fn same_bracket(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
}

/// Result of using an index for candidate selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexScan {
    pub index_name: String,
    pub ids: Vec<DocumentId>,
    pub keys_examined: u64,
}

/// B-tree index over a compound key.
///
/// Array values are multikey: every element is indexed under its own key. Documents whose
/// key cannot be formed (empty arrays, nested arrays, sub-documents, other BSON types) are
/// kept in `unkeyed` and returned by every scan, so the filter still decides for them.
#[derive(Debug, Clone)]
pub struct OrderedIndex {
    pub name: String,
    pub spec: IndexSpec,
    pub map: BTreeMap<Vec<IndexKey>, BTreeSet<DocumentId>>,
    pub unkeyed: BTreeSet<DocumentId>,
    pub stats: IndexStats,
}

impl OrderedIndex {
    #[must_use]
    pub fn new(name: String, spec: IndexSpec) -> Self {
        Self { name, spec, map: BTreeMap::new(), unkeyed: BTreeSet::new(), stats: IndexStats::default() }
    }

    /// Every compound key `doc` is indexed under, or `None` when it has no key form.
    fn keys_for(&self, doc: &Document) -> Option<BTreeSet<Vec<IndexKey>>> {
        let mut keys: Vec<Vec<IndexKey>> = vec![Vec::new()];
        for (field, _) in &self.spec.keys {
            let parts = match get_path(doc, field) {
                Some(Bson::Array(items)) if items.is_empty() => return None,
                Some(Bson::Array(items)) => items
                    .iter()
                    .map(|x| match x {
                        Bson::Array(_) => None,
                        x => IndexKey::from_bson(Some(x)),
                    })
                    .collect::<Option<Vec<_>>>()?,
                other => vec![IndexKey::from_bson(other)?],
            };
            keys = keys
                .iter()
                .flat_map(|prefix| {
                    parts.iter().map(move |p| {
                        let mut k = prefix.clone();
                        k.push(p.clone());
                        k
                    })
                })
                .collect();
        }
        Some(keys.into_iter().collect())
    }

    pub fn insert(&mut self, doc: &Document, id: &DocumentId) {
        let Some(keys) = self.keys_for(doc) else {
            self.unkeyed.insert(*id);
            return;
        };
        for k in keys {
            if self.map.entry(k).or_default().insert(*id) {
                self.stats.entries += 1;
            }
        }
        self.stats.keys = self.map.len();
    }

    pub fn remove(&mut self, doc: &Document, id: &DocumentId) {
        let Some(keys) = self.keys_for(doc) else {
            self.unkeyed.remove(id);
            return;
        };
        for k in keys {
            if let Some(set) = self.map.get_mut(&k) {
                if set.remove(id) {
                    self.stats.entries = self.stats.entries.saturating_sub(1);
                }
                if set.is_empty() {
                    self.map.remove(&k);
                }
            }
        }
        self.stats.keys = self.map.len();
    }

    /// Ids whose leading key component satisfies `op value`, plus every unkeyed document.
    /// `None` when the operand has no key form or the operator cannot use an ordered scan.
    #[must_use]
    pub fn scan_leading(&self, op: CmpOp, value: &Bson) -> Option<IndexScan> {
        let probe = IndexKey::from_bson(Some(value))?;
        let start = match op {
            CmpOp::Eq | CmpOp::Gt | CmpOp::Gte => probe.clone(),
            CmpOp::Lt | CmpOp::Lte => probe.bracket_floor(),
            CmpOp::Ne => return None,
        };
        let mut ids = Vec::new();
        let mut keys_examined = 0u64;
        for (key, set) in self.map.range(vec![start]..) {
            let Some(lead) = key.first() else { continue };
            if !lead.same_bracket(&probe) {
                break;
            }
            let ord = lead.cmp(&probe);
            let (keep, done) = match op {
                CmpOp::Eq => (ord.is_eq(), ord.is_gt()),
                CmpOp::Gt => (ord.is_gt(), false),
                CmpOp::Gte => (ord.is_ge(), false),
                CmpOp::Lt => (ord.is_lt(), ord.is_ge()),
                CmpOp::Lte => (ord.is_le(), ord.is_gt()),
                CmpOp::Ne => (false, true),
            };
            if done {
                break;
            }
            if keep {
                keys_examined += u64::try_from(set.len()).unwrap_or(u64::MAX);
                ids.extend(set.iter().copied());
            }
        }
        ids.extend(self.unkeyed.iter().copied());
        let mut seen = BTreeSet::new();
        ids.retain(|id| seen.insert(*id));
        Some(IndexScan { index_name: self.name.clone(), ids, keys_examined })
    }
}

/// All indexes of one collection, keyed by index name.
#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: BTreeMap<String, OrderedIndex>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: BTreeMap::new() }
    }

    /// Registers an empty index. Returns `Ok(false)` when an identical index already exists.
    ///
    /// # Errors
    /// Returns `StoreError::IndexConflict` when the name is taken by a different key pattern.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<bool, StoreError> {
        let name = spec.name();
        if let Some(existing) = self.indexes.get(&name) {
            if existing.spec == spec {
                return Ok(false);
            }
            return Err(StoreError::IndexConflict(format!(
                "index {name} already exists with a different key pattern"
            )));
        }
        self.indexes.insert(name.clone(), OrderedIndex::new(name, spec));
        Ok(true)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    #[must_use]
    pub fn key_pattern(&self, name: &str) -> Option<Document> {
        self.indexes.get(name).map(|i| i.spec.key_pattern())
    }

    pub fn insert_all(&mut self, doc: &Document, id: &DocumentId) {
        for idx in self.indexes.values_mut() {
            idx.insert(doc, id);
        }
    }

    pub fn remove_all(&mut self, doc: &Document, id: &DocumentId) {
        for idx in self.indexes.values_mut() {
            idx.remove(doc, id);
        }
    }

    /// Uses the narrowest index whose leading field is `path`: single-field indexes first,
    /// then by name.
    #[must_use]
    pub fn lookup(&self, path: &str, op: CmpOp, value: &Bson) -> Option<IndexScan> {
        self.indexes
            .values()
            .filter(|i| i.spec.leading_field() == path)
            .min_by_key(|i| i.spec.keys.len())
            .and_then(|i| i.scan_leading(op, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn spec(keys: Document) -> IndexSpec {
        IndexSpec::from_keys(&keys).unwrap()
    }

    fn filled(keys: Document, years: &[i32]) -> (IndexManager, Vec<DocumentId>) {
        let mut mgr = IndexManager::new();
        mgr.create_index(spec(keys)).unwrap();
        let ids: Vec<DocumentId> = years
            .iter()
            .map(|y| {
                let id = DocumentId::new();
                mgr.insert_all(&doc! {"published_year": *y, "author": "A"}, &id);
                id
            })
            .collect();
        (mgr, ids)
    }

    #[test]
    fn names_follow_key_pattern() {
        assert_eq!(spec(doc! {"title": 1}).name(), "title_1");
        assert_eq!(
            spec(doc! {"author": 1, "published_year": -1}).name(),
            "author_1_published_year_-1"
        );
        assert!(IndexSpec::from_keys(&doc! {}).is_err());
        assert!(IndexSpec::from_keys(&doc! {"title": "text"}).is_err());
    }

    #[test]
    fn create_is_idempotent_and_detects_conflicts() {
        let mut mgr = IndexManager::new();
        assert!(mgr.create_index(spec(doc! {"title": 1})).unwrap());
        assert!(!mgr.create_index(spec(doc! {"title": 1})).unwrap());
        assert_eq!(mgr.names(), vec!["title_1".to_string()]);

        // Generated names are unique per pattern, so plant a clashing entry directly.
        let other = spec(doc! {"title": -1});
        mgr.indexes.insert("title_-1".into(), OrderedIndex::new("title_-1".into(), spec(doc! {"author": 1})));
        assert!(matches!(mgr.create_index(other), Err(StoreError::IndexConflict(_))));
    }

    #[test]
    fn range_scan_excludes_boundary() {
        let (mgr, ids) = filled(doc! {"published_year": 1}, &[2014, 2015, 2016, 2021]);
        let scan = mgr.lookup("published_year", CmpOp::Gt, &Bson::Int32(2015)).unwrap();
        assert_eq!(scan.index_name, "published_year_1");
        assert_eq!(scan.ids, vec![ids[2], ids[3]]);
        let scan = mgr.lookup("published_year", CmpOp::Lte, &Bson::Int32(2015)).unwrap();
        assert_eq!(scan.ids, vec![ids[0], ids[1]]);
    }

    #[test]
    fn equality_matches_across_numeric_types() {
        let (mgr, ids) = filled(doc! {"published_year": 1}, &[1965, 2018]);
        let scan = mgr.lookup("published_year", CmpOp::Eq, &Bson::Double(1965.0)).unwrap();
        assert_eq!(scan.ids, vec![ids[0]]);
        let miss = mgr.lookup("published_year", CmpOp::Eq, &Bson::Int32(1900)).unwrap();
        assert!(miss.ids.is_empty());
    }

    #[test]
    fn compound_index_serves_leading_field() {
        let (mgr, ids) = filled(doc! {"author": 1, "published_year": -1}, &[1949, 1945]);
        let scan = mgr.lookup("author", CmpOp::Eq, &Bson::String("A".into())).unwrap();
        assert_eq!(scan.index_name, "author_1_published_year_-1");
        assert_eq!(scan.ids.len(), 2);
        assert!(scan.ids.contains(&ids[0]) && scan.ids.contains(&ids[1]));
        assert!(mgr.lookup("published_year", CmpOp::Eq, &Bson::Int32(1949)).is_none());
    }

    #[test]
    fn array_elements_are_indexed_once_per_key() {
        let mut mgr = IndexManager::new();
        mgr.create_index(spec(doc! {"title": 1})).unwrap();
        let (a, b) = (DocumentId::new(), DocumentId::new());
        mgr.insert_all(&doc! {"title": ["Dune", "Dune", "Dune Messiah"]}, &a);
        mgr.insert_all(&doc! {"title": "Dune"}, &b);
        let scan = mgr.lookup("title", CmpOp::Eq, &Bson::String("Dune".into())).unwrap();
        assert_eq!(scan.ids, vec![a, b]);
        let scan = mgr.lookup("title", CmpOp::Gte, &Bson::String("D".into())).unwrap();
        assert_eq!(scan.ids, vec![a, b]);
        assert_eq!(mgr.indexes["title_1"].stats, IndexStats { keys: 2, entries: 3 });
    }

    #[test]
    fn unkeyed_documents_are_always_candidates() {
        let mut mgr = IndexManager::new();
        mgr.create_index(spec(doc! {"title": 1})).unwrap();
        let (empty, nested, sub) = (DocumentId::new(), DocumentId::new(), DocumentId::new());
        mgr.insert_all(&doc! {"title": []}, &empty);
        mgr.insert_all(&doc! {"title": [["Dune"]]}, &nested);
        mgr.insert_all(&doc! {"title": {"en": "Dune"}}, &sub);
        let scan = mgr.lookup("title", CmpOp::Eq, &Bson::String("Emma".into())).unwrap();
        assert_eq!(scan.ids, vec![empty, nested, sub]);
        assert_eq!(scan.keys_examined, 0);
        mgr.remove_all(&doc! {"title": []}, &empty);
        assert!(!mgr.indexes["title_1"].unkeyed.contains(&empty));
    }

    #[test]
    fn remove_drops_empty_keys() {
        let (mut mgr, ids) = filled(doc! {"published_year": 1}, &[2000]);
        mgr.remove_all(&doc! {"published_year": 2000, "author": "A"}, &ids[0]);
        let idx = &mgr.indexes["published_year_1"];
        assert_eq!(idx.stats, IndexStats::default());

        mgr.create_index(spec(doc! {"tags": 1})).unwrap();
        let id = DocumentId::new();
        let d = doc! {"tags": ["classic", "dystopia"]};
        mgr.insert_all(&d, &id);
        mgr.remove_all(&d, &id);
        assert!(mgr.indexes["tags_1"].map.is_empty());
    }
}
