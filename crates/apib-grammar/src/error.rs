use thiserror::Error;

/// Syntax error reported by the grammar engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct GrammarError {
    /// 1-based source line.
    pub line: usize,
    pub message: String,
}

impl GrammarError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

pub type GrammarResult<T> = Result<T, GrammarError>;
