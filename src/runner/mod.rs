//! Executes the fixed script against a [`Store`] and always closes it.
mod console;
pub mod script;

pub use console::Console;
pub use script::{Request, Step};

use crate::errors::StoreError;
use crate::logger::AUDIT_TARGET;
use crate::store::{DeleteOutcome, Store, UpdateOutcome};
use bson::Document;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::time::Instant;
use uuid::Uuid;

/// Result of one store call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Docs(Vec<Document>),
    Updated(UpdateOutcome),
    Deleted(DeleteOutcome),
    Index(String),
    Explained(Document),
}

impl Outcome {
    /// Documents returned, modified or deleted; `1` for an index or explain.
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            Self::Docs(docs) => u64::try_from(docs.len()).unwrap_or(u64::MAX),
            Self::Updated(u) => u.modified,
            Self::Deleted(d) => d.deleted,
            Self::Index(_) | Self::Explained(_) => 1,
        }
    }
}

/// Issues one request against `store`.
///
/// # Errors
/// Propagates whatever the store returns.
pub async fn execute<S: Store>(store: &S, request: Request) -> Result<Outcome, StoreError> {
    Ok(match request {
        Request::Find { filter, spec } => Outcome::Docs(store.find(filter, spec).await?),
        Request::UpdateOne { filter, update } => Outcome::Updated(store.update_one(filter, update).await?),
        Request::DeleteOne { filter } => Outcome::Deleted(store.delete_one(filter).await?),
        Request::Aggregate { pipeline } => Outcome::Docs(store.aggregate(pipeline).await?),
        Request::CreateIndex { keys } => Outcome::Index(store.create_index(keys).await?),
        Request::Explain { filter } => Outcome::Explained(store.explain_find(filter).await?),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    pub ok: bool,
    pub count: u64,
}

/// What a run did, for callers that should not scrape console text.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
    pub error: Option<String>,
    pub final_state: ConnectionState,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            error: None,
            final_state: ConnectionState::Disconnected,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Count recorded for `step`, if it ran.
    #[must_use]
    pub fn count(&self, step: Step) -> Option<u64> {
        self.steps.iter().find(|r| r.step == step.name()).map(|r| r.count)
    }
}

pub struct Runner<W: Write> {
    console: Console<W>,
}

impl<W: Write> Runner<W> {
    pub const fn new(out: W) -> Self {
        Self { console: Console::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.console.into_inner()
    }

    fn fail(&mut self, report: &mut RunReport, err: &StoreError) {
        log::error!("run {} failed: {err}", report.run_id);
        self.console.error(err);
        report.error = Some(err.to_string());
    }

    /// Connects, runs every scripted step in order and closes the store.
    ///
    /// The first failure skips the remaining steps. A store that was opened is closed exactly once,
    /// whatever happened before.
    pub async fn run<S, F>(&mut self, connect: F) -> RunReport
    where
        S: Store,
        F: Future<Output = Result<S, StoreError>>,
    {
        let mut report = RunReport::new();
        log::info!(target: AUDIT_TARGET, "run={} start", report.run_id);
        match connect.await {
            Ok(store) => {
                self.drive(&store, &mut report).await;
                store.close().await;
            }
            Err(e) => self.fail(&mut report, &e),
        }
        report.final_state = ConnectionState::Closed;
        report.finished_at = Some(Utc::now());
        self.console.closed();
        log::info!(
            target: AUDIT_TARGET,
            "run={} closed ok={} steps={}",
            report.run_id,
            report.succeeded(),
            report.steps.len()
        );
        report
    }

    async fn drive<S: Store>(&mut self, store: &S, report: &mut RunReport) {
        if let Err(e) = store.ping().await {
            self.fail(report, &e);
            return;
        }
        report.final_state = ConnectionState::Connected;
        self.console.connected(store.backend(), &store.namespace());
        for step in Step::SCRIPT {
            let start = Instant::now();
            let result = execute(store, step.request()).await;
            let elapsed_ms = start.elapsed().as_millis();
            match result {
                Ok(outcome) => {
                    let count = outcome.count();
                    log::info!(
                        target: AUDIT_TARGET,
                        "run={} step={step} ok=true count={count} elapsed_ms={elapsed_ms}",
                        report.run_id
                    );
                    self.console.outcome(step, &outcome);
                    report.steps.push(StepRecord { step: step.name(), ok: true, count });
                }
                Err(e) => {
                    log::info!(
                        target: AUDIT_TARGET,
                        "run={} step={step} ok=false elapsed_ms={elapsed_ms}",
                        report.run_id
                    );
                    report.steps.push(StepRecord { step: step.name(), ok: false, count: 0 });
                    self.fail(report, &e);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EmbeddedStore;

    #[tokio::test]
    async fn connect_failure_still_reports_closed() {
        let mut runner = Runner::new(Vec::new());
        let report = runner
            .run(async { Err::<EmbeddedStore, _>(StoreError::Connection("refused".into())) })
            .await;
        assert!(report.steps.is_empty());
        assert_eq!(report.final_state, ConnectionState::Closed);
        let out = String::from_utf8(runner.into_inner()).unwrap();
        assert_eq!(out, "❌ Error: connection error: refused\n🔒 Connection closed\n");
    }

    #[tokio::test]
    async fn empty_collection_runs_every_step() {
        let mut runner = Runner::new(Vec::new());
        let report = runner.run(async { Ok(EmbeddedStore::open("unit", "books")) }).await;
        assert!(report.succeeded(), "{:?}", report.error);
        assert_eq!(report.steps.len(), Step::SCRIPT.len());
        assert_eq!(report.count(Step::UpdatePrice), Some(0));
        assert_eq!(report.count(Step::DeleteByTitle), Some(0));
        assert!(report.finished_at.is_some());
    }
}
