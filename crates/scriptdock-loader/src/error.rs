//! Error types for scriptdock-loader

use scriptdock_runtime::RuntimeError;
use thiserror::Error;

/// Loader error type
#[derive(Debug, Error)]
pub enum LoaderError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Script source failed outside of plain IO (missing file, bad path)
    #[error("Source error: {0}")]
    Source(String),

    /// Compile, execution or invocation error
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Registered script carries no runtime handle
    #[error("Script '{0}' has no runtime handle")]
    MissingHandle(String),

    /// Operation requires a running loader
    #[error("Loader is not running")]
    NotRunning,

    /// File watcher could not be set up
    #[error("Watch error: {0}")]
    Watch(String),
}

impl LoaderError {
    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a watch error
    pub fn watch(msg: impl Into<String>) -> Self {
        Self::Watch(msg.into())
    }
}

impl From<scriptdock_runtime::CompileError> for LoaderError {
    fn from(e: scriptdock_runtime::CompileError) -> Self {
        Self::Runtime(e.into())
    }
}

impl From<notify::Error> for LoaderError {
    fn from(e: notify::Error) -> Self {
        Self::Watch(e.to_string())
    }
}

/// Result type using LoaderError
pub type LoaderResult<T> = Result<T, LoaderError>;
