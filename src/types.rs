use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Internal handle of a stored document. Mirrors the document's `_id` when that is an `ObjectId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub ObjectId);

impl DocumentId {
    #[must_use]
    pub fn new() -> Self {
        Self(ObjectId::new())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Sort or index direction, encoded as `1` / `-1` in key documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// Reads a `1` / `-1` style direction value.
    #[must_use]
    pub fn from_bson(v: &bson::Bson) -> Option<Self> {
        #[allow(clippy::cast_possible_truncation)]
        let n = match v {
            bson::Bson::Int32(i) => i64::from(*i),
            bson::Bson::Int64(i) => *i,
            bson::Bson::Double(f) => *f as i64,
            _ => return None,
        };
        match n {
            1 => Some(Self::Asc),
            -1 => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}
