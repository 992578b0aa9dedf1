//! Error types and handling
//!
//! The error taxonomy is split into domain enums (invocation lifecycle and
//! settings resolution) that are wrapped in the main `DockcallError` enum for
//! unified handling at the crate boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, running, or verifying a container invocation
#[derive(Error, Debug)]
pub enum InvocationError {
    /// The descriptor's image/stage arity is ambiguous or empty
    #[error("Invalid invocation: {message}")]
    Construction { message: String },

    /// A declared input was not present in the working directory before the run
    #[error("Missing input file '{name}' in {}", work_dir.display())]
    MissingInput { name: String, work_dir: PathBuf },

    /// The runtime process chain exited non-zero or could not be launched
    #[error("Container command failed{}: {command} (work dir: {})",
        exit_code.map(|c| format!(" with exit code {}", c)).unwrap_or_default(),
        work_dir.display())]
    Execution {
        command: String,
        work_dir: PathBuf,
        exit_code: Option<i32>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A declared output was not present after a successful run
    #[error("Missing output file: {}", path.display())]
    MissingOutput { path: PathBuf },

    /// The post-run ownership fix failed
    #[error("Failed to normalize ownership of {} using image {image}: {message}", work_dir.display())]
    Cleanup {
        image: String,
        work_dir: PathBuf,
        message: String,
    },

    /// A mock output could not be fetched from its source URL
    #[error("Failed to fetch {url}: {message}")]
    Download { url: String, message: String },

    /// Filesystem error while preparing or substituting files
    #[error("I/O error in working directory")]
    Io(#[from] std::io::Error),
}

/// Settings-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file parsing error
    #[error("Failed to parse settings file: {message}")]
    Parsing { message: String },

    /// A value supplied through the environment could not be interpreted
    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: String, value: String },

    /// Settings file I/O error
    #[error("Failed to read settings file")]
    Io(#[from] std::io::Error),
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum DockcallError {
    /// Invocation lifecycle errors
    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// Settings errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Container runtime errors outside of an invocation (availability checks)
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl DockcallError {
    /// Borrow the invocation error, if this is one
    pub fn as_invocation(&self) -> Option<&InvocationError> {
        match self {
            Self::Invocation(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience type alias for Results with DockcallError
pub type Result<T> = std::result::Result<T, DockcallError>;
