use async_trait::async_trait;

use super::ExecutionResult;
use crate::extract::Snippet;

/// Something that can run one snippet in a fresh context.
///
/// `Err` means the backend could not run the snippet at all. Faults raised by
/// the snippet itself are part of a successful [`ExecutionResult`].
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, snippet: &Snippet) -> anyhow::Result<ExecutionResult>;
}
