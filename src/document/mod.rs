mod core;
mod types;

pub use core::StoredDocument;
pub use types::Metadata;
