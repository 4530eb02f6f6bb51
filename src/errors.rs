use thiserror::Error;

/// Every failure a store operation can produce.
///
/// The runner treats all variants alike: the first error ends the script and
/// hands control to the cleanup step.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("query error: {0}")]
    Query(String),

    #[error("index conflict: {0}")]
    IndexConflict(String),

    #[error("BSON decode: {0}")]
    BsonDecode(#[from] bson::de::Error),

    #[error("BSON encode: {0}")]
    BsonEncode(#[from] bson::ser::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}
