//! Compare what a snippet did with what its document says it does.

use std::fmt;

use serde::Serialize;

use crate::extract::{ExpectedFault, Snippet};
use crate::harness::ExecutionResult;
use crate::lang::{analysis, parser, Fault};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    /// Nothing to check.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    Output {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    Return {
        expected: String,
        actual: String,
    },
    Fault {
        expected: Option<String>,
        actual: Option<String>,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Output { expected, actual } => write!(
                f,
                "output differs: expected {:?}, got {:?}",
                expected, actual
            ),
            Mismatch::Return { expected, actual } => {
                write!(f, "expected return {}, got {}", expected, actual)
            }
            Mismatch::Fault {
                expected: Some(expected),
                actual: Some(actual),
            } => write!(f, "expected {}, raised {}", expected, actual),
            Mismatch::Fault {
                expected: Some(expected),
                actual: None,
            } => write!(f, "expected {}, but nothing was raised", expected),
            Mismatch::Fault {
                expected: None,
                actual,
            } => write!(f, "raised {}", actual.as_deref().unwrap_or("an error")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
    /// Observations that never change the verdict.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Accept `# => "text"` for code that returned nil after printing `text`.
    pub printed_value_fallback: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            printed_value_fallback: true,
        }
    }
}

pub fn assess(snippet: &Snippet, result: &ExecutionResult, opts: &CheckOptions) -> Assessment {
    let mut notes = unreachable_notes(snippet);
    if let Some(name) = &result.probed_method {
        notes.push(format!(
            "return value taken from calling '{}' with no arguments",
            name
        ));
    }

    if snippet.is_informational() {
        if let Some(fault) = &result.fault {
            notes.push(format!("raised {}", fault));
        }
        return Assessment {
            verdict: Verdict::Info,
            mismatches: Vec::new(),
            notes,
        };
    }

    let mut mismatches = Vec::new();
    match (&snippet.expected_fault, &result.fault) {
        (Some(expected), actual) => {
            if !actual.as_ref().map_or(false, |f| fault_matches(expected, f)) {
                mismatches.push(Mismatch::Fault {
                    expected: Some(render_expected_fault(expected)),
                    actual: actual.as_ref().map(Fault::to_string),
                });
            }
            check_output(snippet, result, &mut mismatches);
        }
        (None, Some(fault)) => mismatches.push(Mismatch::Fault {
            expected: None,
            actual: Some(fault.to_string()),
        }),
        (None, None) => {
            check_output(snippet, result, &mut mismatches);
            check_return(snippet, result, opts, &mut mismatches, &mut notes);
        }
    }

    Assessment {
        verdict: if mismatches.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        },
        mismatches,
        notes,
    }
}

fn fault_matches(expected: &ExpectedFault, actual: &Fault) -> bool {
    actual.kind.satisfies(&expected.kind)
        && expected
            .message
            .as_ref()
            .map_or(true, |m| actual.message.contains(m.as_str()))
}

fn render_expected_fault(expected: &ExpectedFault) -> String {
    match &expected.message {
        Some(m) => format!("{}: {}", expected.kind, m),
        None => expected.kind.to_string(),
    }
}

fn check_output(snippet: &Snippet, result: &ExecutionResult, mismatches: &mut Vec<Mismatch>) {
    if let Some(expected) = &snippet.expected_output {
        if *expected != result.stdout {
            mismatches.push(Mismatch::Output {
                expected: expected.clone(),
                actual: result.stdout.clone(),
            });
        }
    }
}

fn check_return(
    snippet: &Snippet,
    result: &ExecutionResult,
    opts: &CheckOptions,
    mismatches: &mut Vec<Mismatch>,
    notes: &mut Vec<String>,
) {
    let Some(expected) = &snippet.expected_return else {
        return;
    };
    let actual = result.return_value.inspect();
    if expected.canonical == actual {
        return;
    }

    if opts.printed_value_fallback && result.return_value.is_nil() {
        if let Some(s) = expected.as_str_literal() {
            if result.stdout.len() == 1 && result.stdout[0] == s {
                notes.push(format!(
                    "returned nil; {} matched the printed output",
                    expected.canonical
                ));
                return;
            }
        }
    }
    mismatches.push(Mismatch::Return {
        expected: expected.canonical.clone(),
        actual,
    });
}

fn unreachable_notes(snippet: &Snippet) -> Vec<String> {
    let Ok(program) = parser::parse_program(&snippet.source_text()) else {
        return Vec::new();
    };
    analysis::unreachable_after_return(&program)
        .into_iter()
        .map(|l| {
            format!(
                "line {} is unreachable after an explicit return",
                snippet.line + l - 1
            )
        })
        .collect()
}

impl Assessment {
    /// One-line description for the report.
    pub fn summary(&self, snippet: &Snippet) -> String {
        match (self.verdict, self.mismatches.first()) {
            (Verdict::Fail, Some(m)) if self.mismatches.len() > 1 => {
                format!("{} (+{} more)", m, self.mismatches.len() - 1)
            }
            (Verdict::Fail, Some(m)) => m.to_string(),
            _ => snippet.headline().to_owned(),
        }
    }
}
