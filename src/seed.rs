//! Loading sample data into a store: the built-in fixture, NDJSON or CSV files.
use crate::errors::StoreError;
use crate::store::Store;
use bson::{Bson, Document};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub cleared: u64,
    pub inserted: u64,
}

fn invalid(msg: impl Into<String>) -> StoreError {
    StoreError::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
}

fn json_to_document(val: serde_json::Value) -> Result<Document, StoreError> {
    match val {
        serde_json::Value::Object(map) => Document::try_from(map).map_err(|e| invalid(e.to_string())),
        _ => Err(invalid("expected JSON object")),
    }
}

/// One JSON object per line; blank lines are skipped. A file holding a single JSON array is
/// accepted too.
///
/// # Errors
/// Returns `StoreError::Json` for malformed lines and `StoreError::Io` for non-object values.
pub fn load_ndjson(path: &Path) -> Result<Vec<Document>, StoreError> {
    let mut reader = BufReader::new(File::open(path)?);
    let head = reader.fill_buf()?;
    let first = head.iter().find(|b| !b.is_ascii_whitespace()).copied();
    if first == Some(b'[') {
        let val: serde_json::Value = serde_json::from_reader(reader)?;
        let serde_json::Value::Array(items) = val else {
            return Err(invalid("expected JSON array"));
        };
        return items.into_iter().map(json_to_document).collect();
    }
    let mut docs = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let val: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            log::warn!("{}:{}: {e}", path.display(), line_no + 1);
            e
        })?;
        docs.push(json_to_document(val)?);
    }
    Ok(docs)
}

/// Infers int, float or bool from a CSV cell; empty cells become null.
fn cell_to_bson(cell: &str) -> Bson {
    let cell = cell.trim();
    if cell.is_empty() {
        return Bson::Null;
    }
    if let Ok(i) = cell.parse::<i32>() {
        return Bson::Int32(i);
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Bson::Int64(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Bson::Double(f);
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Bson::Boolean(true),
        "false" => Bson::Boolean(false),
        _ => Bson::String(cell.to_string()),
    }
}

/// CSV with a header row naming the fields.
///
/// # Errors
/// Returns `StoreError::Csv` for malformed rows.
pub fn load_csv(path: &Path) -> Result<Vec<Document>, StoreError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut docs = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let mut doc = Document::new();
        for (i, cell) in rec.iter().enumerate() {
            let key = headers.get(i).cloned().unwrap_or_else(|| format!("field_{i}"));
            doc.insert(key, cell_to_bson(cell));
        }
        docs.push(doc);
    }
    Ok(docs)
}

/// Picks the loader from the file extension: `.csv` is CSV, anything else JSON.
///
/// # Errors
/// Propagates loader errors.
pub fn load_file(path: &Path) -> Result<Vec<Document>, StoreError> {
    let is_csv = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv { load_csv(path) } else { load_ndjson(path) }
}

/// Inserts `docs`, first emptying the collection when `drop` is set.
///
/// # Errors
/// Propagates store errors.
pub async fn seed<S: Store>(store: &S, docs: Vec<Document>, drop: bool) -> Result<SeedReport, StoreError> {
    let cleared = if drop { store.clear().await? } else { 0 };
    let inserted = store.insert_many(docs).await?;
    log::info!("seeded {} with {inserted} document(s), cleared {cleared}", store.namespace());
    Ok(SeedReport { cleared, inserted })
}
