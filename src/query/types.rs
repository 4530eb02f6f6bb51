use crate::types::Order;
use bson::Bson;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;
pub(crate) const MAX_UPDATE_FIELDS: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Field selection applied after sort/skip/limit.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Keep only `fields`, plus `_id` unless `keep_id` is false.
    Include { fields: Vec<String>, keep_id: bool },
    /// Drop `fields`, keep everything else.
    Exclude { fields: Vec<String> },
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Vec<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    #[cfg(feature = "regex")]
    Regex { path: String, pattern: Pattern },
}

/// A `$regex` compiled once at parse time. Case-insensitivity is folded into the pattern as
/// `(?i)`, so two patterns are equal when their sources are.
#[cfg(feature = "regex")]
#[derive(Debug, Clone)]
pub struct Pattern(pub regex::Regex);

#[cfg(feature = "regex")]
impl Pattern {
    pub(crate) const SIZE_LIMIT: usize = 1 << 20;

    /// # Errors
    /// Returns `StoreError::Query` when the pattern does not compile.
    pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Self, crate::errors::StoreError> {
        let source = if case_insensitive { format!("(?i){pattern}") } else { pattern.to_string() };
        regex::RegexBuilder::new(&source)
            .size_limit(Self::SIZE_LIMIT)
            .build()
            .map(Self)
            .map_err(|e| crate::errors::StoreError::query(format!("invalid $regex: {e}")))
    }
}

#[cfg(feature = "regex")]
impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, Bson)>,
    pub unset: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}
