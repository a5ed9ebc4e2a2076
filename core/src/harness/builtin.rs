use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{split_lines, ExecutionResult, Executor};
use crate::extract::Snippet;
use crate::lang::ast::{ExprKind, Program};
use crate::lang::parser::{self, ParseError};
use crate::lang::{Context, Fault, FaultKind, Value};

/// Runs snippets with the in-process evaluator.
#[derive(Debug, Clone)]
pub struct BuiltinExecutor {
    time_limit: Duration,
    max_call_depth: usize,
}

impl Default for BuiltinExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinExecutor {
    pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(2000);

    pub fn new() -> Self {
        Self {
            time_limit: Self::DEFAULT_TIME_LIMIT,
            max_call_depth: Context::DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn run(&self, snippet: &Snippet) -> ExecutionResult {
        let started_at = Instant::now();
        let mut cx = Context::new()
            .time_limit(self.time_limit)
            .max_call_depth(self.max_call_depth);

        let mut probed_method = None;
        let outcome = self.run_in(&mut cx, snippet, &mut probed_method);
        let stdout = split_lines(cx.output());

        let (return_value, fault) = match outcome {
            Ok(v) => (v, None),
            Err(f) => (Value::Nil, Some(f)),
        };
        ExecutionResult {
            snippet_id: snippet.id,
            stdout,
            return_value,
            fault,
            probed_method,
            elapsed: started_at.elapsed(),
        }
    }

    fn run_in(
        &self,
        cx: &mut Context,
        snippet: &Snippet,
        probed_method: &mut Option<String>,
    ) -> Result<Value, Fault> {
        let setup = parser::parse_program(&snippet.setup_text()).map_err(syntax_fault)?;
        let res = cx.run(&setup);
        // setup output is never part of the snippet's output
        cx.take_output();
        res?;

        let body = parser::parse_program_with_locals(&snippet.source_text(), &setup.top_level_locals)
            .map_err(syntax_fault)?;
        let value = cx.run(&body)?;

        if snippet.expected_return.is_some() {
            if let Some(name) = trailing_nullary_def(&body) {
                log::debug!("snippet {}: probing '{}' for its return value", snippet.id, name);
                let value = cx.invoke(name)?;
                *probed_method = Some(name.to_owned());
                return Ok(value);
            }
        }
        Ok(value)
    }
}

/// Name of the method defined by the last statement, if it takes no arguments.
pub(super) fn trailing_nullary_def(program: &Program) -> Option<&str> {
    match &program.body.last()?.kind {
        ExprKind::Def(def) if def.required_arity() == 0 => Some(&def.name),
        _ => None,
    }
}

fn syntax_fault(e: ParseError) -> Fault {
    let line = e.line();
    Fault::new(FaultKind::SyntaxError, e.to_string()).at(line)
}

#[async_trait]
impl Executor for BuiltinExecutor {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn execute(&self, snippet: &Snippet) -> anyhow::Result<ExecutionResult> {
        Ok(self.run(snippet))
    }
}
