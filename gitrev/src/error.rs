use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::query::Query;

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("{query}: no tag reachable from HEAD")]
    NoTagFound { query: Query },

    #[error("{query}: repository has no commits")]
    NoCommitFound { query: Query },

    #[error("{query}: '{}' is not a git repository", path.display())]
    NotARepository { query: Query, path: PathBuf },

    #[error("{query}: unable to run '{program}': {source}")]
    ToolUnavailable {
        query: Query,
        program: String,
        source: std::io::Error,
    },

    #[error("{query}: timed out after {}s", after.as_secs_f32())]
    Timeout { query: Query, after: Duration },

    #[error("{query}: git exited with {status}: {stderr}")]
    QueryFailed {
        query: Query,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{query}: I/O error talking to git: {source}")]
    Io {
        query: Query,
        source: std::io::Error,
    },

    #[error("{query}: git output was not valid UTF-8")]
    InvalidOutput { query: Query },
}

impl ResolutionError {
    /// The query that produced this error.
    pub fn query(&self) -> Query {
        match self {
            ResolutionError::NoTagFound { query }
            | ResolutionError::NoCommitFound { query }
            | ResolutionError::NotARepository { query, .. }
            | ResolutionError::ToolUnavailable { query, .. }
            | ResolutionError::Timeout { query, .. }
            | ResolutionError::QueryFailed { query, .. }
            | ResolutionError::Io { query, .. }
            | ResolutionError::InvalidOutput { query } => *query,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolutionError>;
