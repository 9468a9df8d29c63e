//! Error types for altpy.
//!
//! Core operations return [`Error`], whose variants are the failure kinds a
//! user can act on. Filesystem and runtime failures travel as `anyhow::Error`
//! inside [`Error::Other`] so their context chain is kept intact.

use std::fmt;
use std::path::PathBuf;

/// Result type alias using the altpy [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidVersion,
    NotFound,
    NetworkError,
    BuildFailed,
    NameCollision,
    AlreadyInstalled,
    Interrupted,
    CleanFailed,
    Other,
}

impl ErrorKind {
    /// Process exit code reported by the CLI for this kind of failure.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InvalidVersion => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::NetworkError => 4,
            ErrorKind::BuildFailed => 5,
            ErrorKind::NameCollision => 6,
            ErrorKind::AlreadyInstalled => 7,
            ErrorKind::Interrupted => 130,
            ErrorKind::CleanFailed | ErrorKind::Other => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidVersion => "InvalidVersion",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::BuildFailed => "BuildFailed",
            ErrorKind::NameCollision => "NameCollision",
            ErrorKind::AlreadyInstalled => "AlreadyInstalled",
            ErrorKind::Interrupted => "Interrupted",
            ErrorKind::CleanFailed => "CleanFailed",
            ErrorKind::Other => "Error",
        };
        f.write_str(name)
    }
}

/// Structured error type for altpy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid version '{0}': expected MAJOR.MINOR.PATCH, e.g. 3.8.2")]
    InvalidVersion(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{step} failed ({status})")]
    BuildFailed {
        step: String,
        status: String,
        /// Captured stdout/stderr of the failing toolchain step.
        output: String,
    },

    #[error("{name} already exists at {} and does not belong to this install", path.display())]
    NameCollision { name: String, path: PathBuf },

    #[error("Python {version} is already installed (use --reinstall to rebuild it)")]
    AlreadyInstalled { version: String },

    #[error("interrupted")]
    Interrupted,

    #[error("failed to remove {} version(s): {}", failures.len(), summarize(failures))]
    CleanFailed { failures: Vec<(String, Error)> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn summarize(failures: &[(String, Error)]) -> String {
    failures
        .iter()
        .map(|(version, e)| format!("{}: {}", version, e))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    pub fn network(message: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Error::Network {
            message: message.into(),
            source: source.map(Into::into),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidVersion(_) => ErrorKind::InvalidVersion,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Network { .. } => ErrorKind::NetworkError,
            Error::BuildFailed { .. } => ErrorKind::BuildFailed,
            Error::NameCollision { .. } => ErrorKind::NameCollision,
            Error::AlreadyInstalled { .. } => ErrorKind::AlreadyInstalled,
            Error::Interrupted => ErrorKind::Interrupted,
            Error::CleanFailed { .. } => ErrorKind::CleanFailed,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Toolchain output to surface alongside the message, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Error::BuildFailed { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}
