use super::Outcome;
use super::script::Step;
use crate::errors::StoreError;
use bson::{Bson, Document};
use std::io::Write;

/// Emoji-prefixed progress lines. Write failures are ignored: console output never aborts a run.
pub struct Console<W: Write> {
    out: W,
}

fn render(doc: &Document) -> String {
    Bson::Document(doc.clone()).into_relaxed_extjson().to_string()
}

impl<W: Write> Console<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    pub fn connected(&mut self, backend: &str, namespace: &str) {
        self.line(&format!("✅ Connected to {backend} ({namespace})"));
    }

    pub fn outcome(&mut self, step: Step, outcome: &Outcome) {
        match outcome {
            Outcome::Docs(docs) => {
                self.line(&step.heading());
                if docs.is_empty() {
                    self.line("   (none)");
                }
                for d in docs {
                    self.line(&format!("   {}", render(d)));
                }
            }
            Outcome::Updated(u) => {
                self.line(&format!("{}: {} matched, {} modified", step.heading(), u.matched, u.modified));
            }
            Outcome::Deleted(d) => {
                self.line(&format!("{}: {} deleted", step.heading(), d.deleted));
            }
            Outcome::Index(name) => self.line(&format!("{}: {name}", step.heading())),
            Outcome::Explained(explain) => {
                self.line(&step.heading());
                let stats = explain.get_document("executionStats").unwrap_or(explain);
                let json = Bson::Document(stats.clone()).into_relaxed_extjson();
                let text = serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string());
                for l in text.lines() {
                    self.line(&format!("   {l}"));
                }
            }
        }
    }

    pub fn error(&mut self, err: &StoreError) {
        self.line(&format!("❌ Error: {err}"));
    }

    pub fn closed(&mut self) {
        self.line("🔒 Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeleteOutcome, UpdateOutcome};
    use bson::doc;

    fn text(f: impl FnOnce(&mut Console<Vec<u8>>)) -> String {
        let mut c = Console::new(Vec::new());
        f(&mut c);
        String::from_utf8(c.into_inner()).unwrap()
    }

    #[test]
    fn documents_render_as_relaxed_json() {
        let out = text(|c| {
            c.outcome(Step::FindByAuthor, &Outcome::Docs(vec![doc! {"title": "Animal Farm", "price": 8.5}]));
        });
        assert_eq!(out, "📚 Books by George Orwell:\n   {\"title\":\"Animal Farm\",\"price\":8.5}\n");
    }

    #[test]
    fn counts_and_markers() {
        let out = text(|c| {
            c.outcome(Step::UpdatePrice, &Outcome::Updated(UpdateOutcome { matched: 1, modified: 1 }));
            c.outcome(Step::DeleteByTitle, &Outcome::Deleted(DeleteOutcome { deleted: 0 }));
            c.outcome(Step::IndexTitle, &Outcome::Index("title_1".into()));
            c.error(&StoreError::Connection("refused".into()));
            c.closed();
        });
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("✏️") && lines[0].ends_with("1 modified"));
        assert!(lines[1].starts_with("🗑️") && lines[1].ends_with("0 deleted"));
        assert_eq!(lines[2], "🔎 Created index: title_1");
        assert_eq!(lines[3], "❌ Error: connection error: refused");
        assert_eq!(lines[4], "🔒 Connection closed");
    }

    #[test]
    fn explain_prints_execution_stats_only() {
        let explain = doc! {"queryPlanner": {"x": 1}, "executionStats": {"nReturned": 1_i64}};
        let out = text(|c| c.outcome(Step::ExplainTitle, &Outcome::Explained(explain)));
        assert!(out.contains("\"nReturned\": 1"));
        assert!(!out.contains("queryPlanner"));
    }

    #[test]
    fn empty_results_are_marked() {
        let out = text(|c| c.outcome(Step::FindByGenre, &Outcome::Docs(Vec::new())));
        assert!(out.ends_with("   (none)\n"));
    }
}
