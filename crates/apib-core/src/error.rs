use std::io;
use std::path::{Path, PathBuf};

use apib_grammar::GrammarError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    InvalidInput = 2,
    Transclusion = 3,
    Interpolation = 4,
    FixtureSyntax = 5,
    Grammar = 6,
    UnsupportedFormat = 7,
    InvalidDestination = 8,
    Io = 9,
    Internal = 10,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("transclusion failed: {0}")]
    Transclusion(String),

    #[error("interpolation failed: {0}")]
    Interpolation(String),

    #[error("invalid JSON fixture {fragment}{} at line {line}: {message}", origin_suffix(.origin))]
    FixtureSyntax {
        fragment: String,
        line: usize,
        origin: Option<String>,
        message: String,
    },

    #[error("failed to parse blueprint: {0}")]
    Grammar(#[from] GrammarError),

    #[error("unsupported format '{key}'")]
    UnsupportedFormat { key: String },

    #[error("file destinations must contain an extension, got '{}'", .path.display())]
    InvalidDestination { path: PathBuf },

    #[error("i/o error at {}: {source}", .path.display())]
    Filesystem { path: PathBuf, source: io::Error },

    #[error("compile task failed: {0}")]
    Task(String),
}

fn origin_suffix(origin: &Option<String>) -> String {
    match origin {
        Some(origin) => format!(" in {origin}"),
        None => String::new(),
    }
}

impl CompileError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Input(_) => ExitCode::InvalidInput,
            Self::Transclusion(_) => ExitCode::Transclusion,
            Self::Interpolation(_) => ExitCode::Interpolation,
            Self::FixtureSyntax { .. } => ExitCode::FixtureSyntax,
            Self::Grammar(_) => ExitCode::Grammar,
            Self::UnsupportedFormat { .. } => ExitCode::UnsupportedFormat,
            Self::InvalidDestination { .. } => ExitCode::InvalidDestination,
            Self::Filesystem { .. } => ExitCode::Io,
            Self::Task(_) => ExitCode::Internal,
        }
    }

    pub(crate) fn filesystem(path: &Path, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_error_names_origin_when_known() {
        let err = CompileError::FixtureSyntax {
            fragment: "{not json}".into(),
            line: 3,
            origin: Some("notes.apib".into()),
            message: "key must be a string".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid JSON fixture {not json} in notes.apib at line 3: key must be a string"
        );
        assert_eq!(err.exit_code(), ExitCode::FixtureSyntax);
    }

    #[test]
    fn destination_error_mentions_path() {
        let err = CompileError::InvalidDestination {
            path: PathBuf::from("out"),
        };
        assert!(err.to_string().contains("'out'"));
        assert_eq!(err.exit_code() as u8, 8);
    }
}
