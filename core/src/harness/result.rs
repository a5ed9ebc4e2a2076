use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::lang::{Fault, FaultKind, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub snippet_id: usize,
    pub stdout: Vec<String>,
    /// `nil` when nothing was returned
    pub return_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
    /// Method whose result stands in for the return value of a snippet that
    /// only defines it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probed_method: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_millis() as u64)
}

/// Timing is not part of the outcome.
impl PartialEq for ExecutionResult {
    fn eq(&self, other: &Self) -> bool {
        self.snippet_id == other.snippet_id
            && self.stdout == other.stdout
            && self.return_value == other.return_value
            && self.fault == other.fault
            && self.probed_method == other.probed_method
    }
}

impl ExecutionResult {
    pub fn raised_error(&self) -> bool {
        self.fault.is_some()
    }

    /// The backend itself failed; reported as a fault of the snippet.
    pub fn harness_failure(snippet_id: usize, err: &anyhow::Error) -> Self {
        Self {
            snippet_id,
            stdout: Vec::new(),
            return_value: Value::Nil,
            fault: Some(Fault::new(FaultKind::HarnessError, format!("{:#}", err))),
            probed_method: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Captured output as lines, without line terminators.
pub fn split_lines(output: &str) -> Vec<String> {
    output.lines().map(str::to_owned).collect()
}
