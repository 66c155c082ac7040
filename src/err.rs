use thiserror::Error;

use std::io;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, EvtTxtError>;
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Errors produced while interpreting a single line of an event log.
///
/// Line numbers are 1-based, counted from the first line fed to the parser.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(
        "Line {line_number}: expected {expected} `:`-separated fields, found {found} in `{line}`"
    )]
    MalformedLine {
        line_number: u64,
        expected: usize,
        found: usize,
        line: String,
    },

    #[error("Line {line_number}: `{value}` is not a valid string count: {source}")]
    InvalidStringCount {
        line_number: u64,
        value: String,
        source: ParseIntError,
    },
}

impl ParseError {
    pub fn line_number(&self) -> u64 {
        match self {
            ParseError::MalformedLine { line_number, .. } => *line_number,
            ParseError::InvalidStringCount { line_number, .. } => *line_number,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvtTxtError {
    #[error("Failed to open file {}: {source}", .path.display())]
    FailedToOpenFile { path: PathBuf, source: io::Error },

    #[error("Failed to create output file {}: {source}", .path.display())]
    FailedToCreateOutput { path: PathBuf, source: io::Error },

    #[error(
        "An I/O error has occurred while trying to read line {line_number} of {}: {source}",
        display_input(.path)
    )]
    FailedToRead {
        path: Option<PathBuf>,
        line_number: u64,
        source: io::Error,
    },

    #[error("An I/O error has occurred while writing output for {}: {source}", display_input(.path))]
    FailedToWrite {
        path: Option<PathBuf>,
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", display_input(.path))]
    Parse {
        path: Option<PathBuf>,
        source: ParseError,
    },

    #[error("`serde_json` failed to serialize a record of {}: {source}", display_input(.path))]
    FailedToSerialize {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },

    #[error("Invalid search pattern `{pattern}`: {source}")]
    InvalidGlobPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Failed to traverse {}: {source}", .path.display())]
    Traversal { path: PathBuf, source: io::Error },
}

fn display_input(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "input".to_owned(),
    }
}

impl From<ParseError> for EvtTxtError {
    fn from(source: ParseError) -> Self {
        EvtTxtError::Parse { path: None, source }
    }
}

impl From<serde_json::Error> for EvtTxtError {
    fn from(source: serde_json::Error) -> Self {
        EvtTxtError::FailedToSerialize { path: None, source }
    }
}

impl EvtTxtError {
    pub(crate) fn write(source: io::Error) -> Self {
        EvtTxtError::FailedToWrite { path: None, source }
    }

    /// Attaches the path of the file being converted, unless the error already names one.
    pub fn in_file(self, file: impl Into<PathBuf>) -> Self {
        let file = Some(file.into());
        match self {
            EvtTxtError::Parse { path: None, source } => EvtTxtError::Parse { path: file, source },
            EvtTxtError::FailedToRead {
                path: None,
                line_number,
                source,
            } => EvtTxtError::FailedToRead {
                path: file,
                line_number,
                source,
            },
            EvtTxtError::FailedToWrite { path: None, source } => {
                EvtTxtError::FailedToWrite { path: file, source }
            }
            EvtTxtError::FailedToSerialize { path: None, source } => {
                EvtTxtError::FailedToSerialize { path: file, source }
            }
            other => other,
        }
    }

    /// The input file this error relates to, if known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            EvtTxtError::FailedToOpenFile { path, .. }
            | EvtTxtError::FailedToCreateOutput { path, .. }
            | EvtTxtError::Traversal { path, .. } => Some(path),
            EvtTxtError::FailedToRead { path, .. }
            | EvtTxtError::FailedToWrite { path, .. }
            | EvtTxtError::FailedToSerialize { path, .. }
            | EvtTxtError::Parse { path, .. } => path.as_deref(),
            EvtTxtError::InvalidGlobPattern { .. } => None,
        }
    }
}
