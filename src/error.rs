// src/error.rs

//! Central error type for glix
//!
//! Variants map one-to-one onto the semantic failure kinds of the system:
//! user-input errors from the resolver, build failures carrying the captured
//! stderr, store-level faults, and transport errors from the RPC client.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by glix
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed user input (empty module path, bad flag value)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record or resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The resolver exhausted every strategy for the given path
    #[error("unable to resolve module {0}")]
    Unresolvable(String),

    /// The requested version is not in the upstream version list
    #[error("unknown version {version} for module {module}")]
    UnknownVersion { module: String, version: String },

    /// The path resolves to a module but not to an installable command
    #[error("module {0} is not installable and no command paths were discovered")]
    NotInstallable(String),

    /// A build-tool invocation failed; `stderr` holds the captured output
    #[error("build failed: {message}")]
    BuildFailed { message: String, stderr: String },

    /// The database file could not be opened exclusively
    #[error("metadata store is locked by another process")]
    StoreLocked,

    /// The store was asked to operate after `close`
    #[error("metadata store is closed")]
    StoreClosed,

    /// Retryable failure (dial, upstream probe)
    #[error("transient failure: {0}")]
    Transient(String),

    /// No server could be reached or started
    #[error("server unreachable: {0}")]
    ServerUnreachable(String),

    /// The operation's context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Bad configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Unclassified fault, also returned for recovered panics at the RPC boundary
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    /// True for errors caused by what the user typed, as opposed to
    /// environment or infrastructure faults.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::Unresolvable(_)
                | Error::UnknownVersion { .. }
                | Error::NotInstallable(_)
        )
    }
}
