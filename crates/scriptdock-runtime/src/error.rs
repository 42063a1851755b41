//! Error types for scriptdock-runtime

use thiserror::Error;

/// Malformed script source, reported with the position of the first error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{identifier}:{line}:{column}: {message}")]
pub struct CompileError {
    /// Identifier of the script that failed to compile
    pub identifier: String,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    pub message: String,
}

/// Errors that can occur while compiling, loading or invoking scripts
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Source could not be parsed or transformed
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// `require()` named a module the resolver does not know
    #[error("Cannot find module '{specifier}' from '{from}'")]
    Resolution { specifier: String, from: String },

    /// Script body (or an invoked export) threw
    #[error("Error in script '{identifier}': {message}")]
    Execution { identifier: String, message: String },

    /// No script is loaded under this identifier
    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    /// Invoked export path does not name a callable
    #[error("export '{path}' of script '{identifier}' is not a function")]
    NotAFunction { identifier: String, path: String },

    /// An intermediate export path segment is not an object
    #[error("{0} is not an object")]
    NotAnObject(String),

    /// Host context variable name is unusable inside a module scope
    #[error("Invalid context variable name '{name}': {reason}")]
    InvalidContextName { name: String, reason: String },

    /// Value could not cross the host/engine boundary
    #[error("Value conversion error: {0}")]
    Conversion(String),

    /// IO error while reading module sources
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Create a resolution error
    pub fn resolution(specifier: impl Into<String>, from: impl Into<String>) -> Self {
        Self::Resolution {
            specifier: specifier.into(),
            from: from.into(),
        }
    }

    /// Create an execution error
    pub fn execution(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Create a "not a function" invocation error
    pub fn not_a_function(identifier: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotAFunction {
            identifier: identifier.into(),
            path: path.into(),
        }
    }

    /// Create an invalid context name error
    pub fn invalid_context_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidContextName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Conversion(e.to_string())
    }
}

/// Result type alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
