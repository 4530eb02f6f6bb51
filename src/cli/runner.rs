use crate::book::fixture_documents;
use crate::config::Settings;
use crate::errors::StoreError;
use crate::runner::{RunReport, Runner};
use crate::seed::{load_file, seed};
use crate::store::{EmbeddedStore, MongoStore, Store};
use std::io::Write;

use super::command::Command;

/// Executes one command, writing console lines to `out`.
///
/// A failed script run is reported through the returned [`RunReport`], not as an `Err`.
///
/// # Errors
/// Returns an error when seeding fails or a seed file cannot be loaded.
pub async fn run<W: Write>(
    settings: &Settings,
    cmd: Command,
    mut out: W,
) -> Result<Option<RunReport>, StoreError> {
    match cmd {
        Command::Run => {
            let mut runner = Runner::new(out);
            let report = runner
                .run(MongoStore::connect(&settings.uri, &settings.database, &settings.collection))
                .await;
            Ok(Some(report))
        }
        Command::Seed { file, drop } => {
            let docs = match &file {
                Some(path) => load_file(path)?,
                None => fixture_documents()?,
            };
            let store =
                MongoStore::connect(&settings.uri, &settings.database, &settings.collection).await?;
            let result = match store.ping().await {
                Ok(()) => seed(&store, docs, drop).await,
                Err(e) => Err(e),
            };
            let namespace = store.namespace();
            store.close().await;
            let report = result?;
            let _ = writeln!(
                out,
                "✅ Seeded {namespace}: {} inserted, {} cleared",
                report.inserted, report.cleared
            );
            Ok(None)
        }
        Command::Demo => {
            let store = EmbeddedStore::open(&settings.database, &settings.collection);
            seed(&store, fixture_documents()?, false).await?;
            let mut runner = Runner::new(out);
            let report = runner.run(async { Ok(store) }).await;
            Ok(Some(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn demo_prints_every_marker() {
        let settings = AppConfig::default().into_settings();
        let mut buf = Vec::new();
        let report = run(&settings, Command::Demo, &mut buf).await.unwrap().unwrap();
        assert!(report.succeeded(), "{:?}", report.error);
        let text = String::from_utf8(buf).unwrap();
        for marker in ["✅", "📚", "✏️", "🗑️", "📊", "🔎", "🧪", "🔒"] {
            assert!(text.contains(marker), "missing {marker}");
        }
        assert!(!text.contains("❌"));
        assert!(text.starts_with("✅ Connected to embedded (plp_bookstore.books)"));
    }

    #[tokio::test]
    async fn seed_reports_unreadable_file() {
        let settings = AppConfig::default().into_settings();
        let dir = tempfile::tempdir().unwrap();
        let cmd = Command::Seed { file: Some(dir.path().join("nope.ndjson")), drop: false };
        assert!(matches!(run(&settings, cmd, Vec::new()).await, Err(StoreError::Io(_))));
    }
}
