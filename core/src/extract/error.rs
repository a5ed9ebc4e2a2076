/// Why an example block was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("block at line {block_line}: '{construct}' opened at line {line} is never closed")]
    Unclosed {
        block_line: usize,
        construct: String,
        line: usize,
    },

    #[error("block at line {block_line}: stray '{token}' at line {line}")]
    StrayClose {
        block_line: usize,
        token: String,
        line: usize,
    },

    #[error("block at line {block_line}: indentation mixes tabs and spaces at line {line}")]
    MixedIndentation { block_line: usize, line: usize },

    #[error("block at line {block_line}: cannot tokenize line {line}: {message}")]
    Tokenize {
        block_line: usize,
        line: usize,
        message: String,
    },

    #[error("block at line {block_line}: code fence is never closed")]
    UnclosedFence { block_line: usize },
}

impl ExtractionError {
    pub fn block_line(&self) -> usize {
        use ExtractionError::*;
        match self {
            Unclosed { block_line, .. }
            | StrayClose { block_line, .. }
            | MixedIndentation { block_line, .. }
            | Tokenize { block_line, .. }
            | UnclosedFence { block_line } => *block_line,
        }
    }
}
