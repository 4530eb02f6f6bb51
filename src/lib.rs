pub mod aggregate;
pub mod book;
pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod index;
pub mod logger;
pub mod num;
pub mod query;
pub mod runner;
pub mod seed;
pub mod store;
pub mod types;

pub use errors::StoreError;
pub use runner::{RunReport, Runner};
pub use store::{EmbeddedStore, MongoStore, Store};
