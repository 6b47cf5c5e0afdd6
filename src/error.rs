use std::io;

use thiserror::Error;

/// Why a timestamp string could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("timestamp '{0}' has too many commas")]
    TooManyCommas(String),
    #[error("expected an integer but got '{0}'")]
    InvalidComponent(String),
}

/// A recoverable problem found while scanning a subtitle file.
///
/// Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseAnomaly {
    #[error("expected cue index on line {line}, but got '{content}'")]
    MissingIndex { line: usize, content: String },
    #[error("expected cue {expected} but got {found} on line {line}")]
    IndexMismatch {
        line: usize,
        expected: u64,
        found: u64,
    },
    #[error("invalid timestamp line on line {line}: '{content}'")]
    MalformedRange { line: usize, content: String },
    #[error("invalid timestamp line on line {line}: '{content}' ({reason})")]
    MalformedTimestamp {
        line: usize,
        content: String,
        reason: TimestampError,
    },
    #[error("input ended on line {line} while a timestamp line was expected")]
    UnexpectedEof { line: usize },
}

impl ParseAnomaly {
    pub fn line(&self) -> usize {
        match self {
            ParseAnomaly::MissingIndex { line, .. }
            | ParseAnomaly::IndexMismatch { line, .. }
            | ParseAnomaly::MalformedRange { line, .. }
            | ParseAnomaly::MalformedTimestamp { line, .. }
            | ParseAnomaly::UnexpectedEof { line } => *line,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start the subtitle ticker")]
    Spawn(#[source] io::Error),
}
