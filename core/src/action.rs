pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}

use std::path::Path;

use error::*;

use crate::checker::{self, CheckOptions};
use crate::config::{Backend, HarnessConfig};
use crate::extract::{self, Extraction};
use crate::harness::{BuiltinExecutor, ExecutionResult, Executor, ProcessExecutor};
use crate::report::{Entry, Report};

pub fn load_document(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fsutil::read_to_string(path).with_context(|| format!("Cannot read document {:?}", path))
}

pub fn extract_snippets(document: &str) -> Extraction {
    let extraction = extract::extract(document);
    log::info!(
        "Extracted {} snippets ({} blocks skipped)",
        extraction.snippets.len(),
        extraction.skipped.len()
    );
    extraction
}

pub fn make_executor(cfg: &HarnessConfig) -> Box<dyn Executor> {
    match cfg.backend {
        Backend::Builtin => Box::new(
            BuiltinExecutor::new()
                .time_limit(cfg.time_limit())
                .max_call_depth(cfg.max_call_depth),
        ),
        Backend::Process => Box::new(
            ProcessExecutor::new(cfg.process_command())
                .shell(&cfg.process.shell)
                .time_limit(cfg.time_limit()),
        ),
    }
}

/// Run every snippet, one at a time in extraction order, and assess it.
pub async fn do_check(
    extraction: Extraction,
    executor: &dyn Executor,
    opts: &CheckOptions,
) -> Report {
    let Extraction { snippets, skipped } = extraction;
    let mut entries = Vec::with_capacity(snippets.len());

    for snippet in snippets {
        log::debug!(
            "Running snippet {} (line {}) with the {} backend",
            snippet.id,
            snippet.line,
            executor.name()
        );
        let result = executor.execute(&snippet).await.unwrap_or_else(|e| {
            log::error!("snippet {}: {:#}", snippet.id, e);
            ExecutionResult::harness_failure(snippet.id, &e)
        });
        let assessment = checker::assess(&snippet, &result, opts);
        log::debug!("snippet {}: {}", snippet.id, assessment.verdict);
        entries.push(Entry {
            snippet,
            result,
            assessment,
        });
    }

    Report {
        entries,
        skipped_blocks: skipped.iter().map(ToString::to_string).collect(),
    }
}

pub fn write_report(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    fsutil::write_with_mkdir(path, contents)
        .with_context(|| format!("Failed to write report to {:?}", path))
}

/// Write the example config into `dir`.
pub fn init_config(dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let path = dir.as_ref().join(crate::Config::FILENAME);
    fsutil::write_new_with_mkdir(&path, crate::Config::example_toml())
        .context("Failed to write config file")?;
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::checker::Verdict;
    use crate::lang::FaultKind;

    struct Failing;

    #[async_trait::async_trait]
    impl Executor for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn execute(&self, _: &crate::extract::Snippet) -> Result<ExecutionResult> {
            bail!("interpreter not found")
        }
    }

    #[tokio::test]
    async fn backend_errors_become_faults() {
        let ex = extract_snippets("#A\nx = 1\n# => 1\n");
        let report = do_check(ex, &Failing, &CheckOptions::default()).await;
        let e = &report.entries[0];
        assert_eq!(e.result.fault.as_ref().unwrap().kind, FaultKind::HarnessError);
        assert_eq!(e.verdict(), Verdict::Fail);
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path()).unwrap();
        assert_eq!(fsutil::read_to_string(&path).unwrap(), crate::Config::example_toml());
        assert!(init_config(dir.path()).is_err());
    }

    #[test]
    fn missing_document_is_an_error() {
        let err = load_document("/nonexistent/learn.rb").unwrap_err();
        assert!(format!("{:#}", err).contains("learn.rb"));
    }
}
