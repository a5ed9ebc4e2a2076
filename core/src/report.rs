//! The ordered result of checking a document.

use std::fmt::Write as _;

use serde::Serialize;

use crate::checker::{Assessment, Mismatch, Verdict};
use crate::extract::Snippet;
use crate::harness::ExecutionResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub snippet: Snippet,
    pub result: ExecutionResult,
    pub assessment: Assessment,
}

impl Entry {
    pub fn verdict(&self) -> Verdict {
        self.assessment.verdict
    }

    /// `[PASS] snippet 3: say_hi "Sunny"`
    pub fn headline(&self) -> String {
        format!(
            "[{}] snippet {}: {}",
            self.verdict(),
            self.snippet.id,
            self.assessment.summary(&self.snippet)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub informational: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub entries: Vec<Entry>,
    /// Blocks left out by the extractor, as messages.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_blocks: Vec<String>,
}

impl Report {
    pub fn counts(&self) -> Counts {
        self.entries
            .iter()
            .fold(Counts::default(), |mut c, e| {
                match e.verdict() {
                    Verdict::Pass => c.passed += 1,
                    Verdict::Fail => c.failed += 1,
                    Verdict::Info => c.informational += 1,
                }
                c
            })
    }

    /// No checked snippet failed.
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.verdict() != Verdict::Fail)
    }

    pub fn summary_line(&self) -> String {
        let c = self.counts();
        let mut s = format!(
            "{} passed, {} failed, {} informational",
            c.passed, c.failed, c.informational
        );
        if !self.skipped_blocks.is_empty() {
            let _ = write!(s, ", {} blocks skipped", self.skipped_blocks.len());
        }
        s
    }

    /// Plain-text rendering, as written to a report file.
    pub fn render_plain(&self, show_notes: bool) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let _ = writeln!(out, "{}", e.headline());
            if e.verdict() == Verdict::Fail {
                for m in &e.assessment.mismatches {
                    render_mismatch(&mut out, m);
                }
            }
            if show_notes {
                for note in &e.assessment.notes {
                    let _ = writeln!(out, "    note: {}", note);
                }
            }
        }
        for skipped in &self.skipped_blocks {
            let _ = writeln!(out, "skipped: {}", skipped);
        }
        let _ = writeln!(out, "{}", self.summary_line());
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn render_mismatch(out: &mut String, m: &Mismatch) {
    match m {
        Mismatch::Output { expected, actual } => {
            let _ = writeln!(out, "    expected output:");
            for l in expected {
                let _ = writeln!(out, "      | {}", l);
            }
            let _ = writeln!(out, "    actual output:");
            for l in actual {
                let _ = writeln!(out, "      | {}", l);
            }
        }
        other => {
            let _ = writeln!(out, "    {}", other);
        }
    }
}
