//! Error types shared by readers, the sample store and the checks.
//!
//! Every variant ends up as an UNKNOWN status at the entry point; the
//! split only exists so callers can tell a missing resource from a
//! kernel interface that changed shape.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading current counters from the pseudo-filesystem.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} not found: ({name})")]
    NotFound { what: &'static str, name: String },

    #[error("Block device not found: {selector} ({reason})")]
    InvalidSelector { selector: String, reason: String },

    #[error("Mount point not valid: ({})", path.display())]
    NotMounted { path: PathBuf },

    #[error("unexpected format in {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },
}

impl ReadError {
    pub fn malformed<S: Into<String>>(path: impl Into<PathBuf>, reason: S) -> Self {
        Self::MalformedSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found<S: Into<String>>(what: &'static str, name: S) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }
}

/// Failure while loading or saving a persisted sample.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sample store I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored sample {} is unreadable: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error for one check invocation.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0}")]
    Argument(String),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot compute {0}")]
    Computation(String),

    #[error("stored sample for {key} does not match current layout: {reason}")]
    SampleLayout { key: String, reason: String },
}

impl ProbeError {
    pub fn argument<S: Into<String>>(msg: S) -> Self {
        Self::Argument(msg.into())
    }

    pub fn computation<S: Into<String>>(msg: S) -> Self {
        Self::Computation(msg.into())
    }
}

/// Result type alias for check operations
pub type Result<T> = std::result::Result<T, ProbeError>;
