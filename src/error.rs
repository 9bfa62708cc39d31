use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by [`crate::BkTree`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("invalid threshold {0}: must be >= 0")]
    InvalidArgument(i64),
    #[error("{0} is not supported by the metric tree")]
    UnsupportedOperation(&'static str),
}

/// Query-level failures. These are caused by the client, are reported back as a failure
/// response and never take the server down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown word passed: {0}")]
    UnknownWord(String),
}

/// Startup failures. Any of these aborts the process before a listener is bound.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} file {path:?} does not exist")]
    MissingPath { what: &'static str, path: PathBuf },
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown schema {0:?} (expected `english` or `russian`)")]
    UnknownSchema(String),
    #[error("invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("dataset {0:?} produced an empty vocabulary")]
    EmptyIndex(PathBuf),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name,
            reason: reason.into(),
        }
    }
}
