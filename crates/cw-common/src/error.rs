//! Error types for Crash Warden.
//!
//! Every failure in this subsystem falls into one of four categories, and
//! every one of them is recovered locally by the component that hit it:
//!
//! - `Filesystem` — a create/rename/delete/read/write call failed; the
//!   operation is treated as "did not happen".
//! - `Parse` — trace-segment or name parsing found no usable data; treated
//!   as "no match".
//! - `Delegate` — a diagnostic collaborator failed; the affected section is
//!   skipped and population continues.
//! - `InvalidConfig` — a configuration entry is unusable; it is logged and
//!   skipped.
//!
//! No error of this type ever propagates to the hosting application's
//! control flow. Public lifecycle operations report success flags or
//! `Option`; `Error` exists so the recovery sites have something precise to
//! log and so tests can assert on the failure class.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Crash Warden operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories matching the recovery contract above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Filesystem call failed; recovered as "operation did not happen".
    Filesystem,
    /// Parse found no usable data; recovered as "no match".
    Parse,
    /// A diagnostic collaborator failed; its section is skipped.
    Delegate,
    /// A configuration entry is unusable; it is skipped.
    Config,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Filesystem => write!(f, "filesystem"),
            Category::Parse => write!(f, "parse"),
            Category::Delegate => write!(f, "delegate"),
            Category::Config => write!(f, "config"),
        }
    }
}

/// Unified error type for Crash Warden.
#[derive(Error, Debug)]
pub enum Error {
    #[error("filesystem {op} failed on {path}: {source}")]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("delegate '{section}' failed: {message}")]
    Delegate { section: String, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a filesystem error tagged with the failing operation and path.
    pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    /// The recovery category this error belongs to.
    pub fn category(&self) -> Category {
        match self {
            Error::Filesystem { .. } => Category::Filesystem,
            Error::Parse(_) => Category::Parse,
            Error::Delegate { .. } => Category::Delegate,
            Error::InvalidConfig(_) => Category::Config,
        }
    }
}
