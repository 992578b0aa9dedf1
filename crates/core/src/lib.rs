//! Core library for running commands inside containers
//!
//! This crate describes a containerized invocation (images, arguments or pipe
//! stages, environment, declared inputs and outputs), renders it into a
//! container runtime command line, checks inputs, runs it, restores host
//! ownership of the working directory, and checks outputs. A mock mode
//! synthesizes declared outputs without touching the runtime.

pub mod command;
pub mod download;
pub mod errors;
pub mod executor;
pub mod invocation;
pub mod logging;
pub mod mock;
pub mod ownership;
pub mod runner;
pub mod settings;
pub mod validate;

pub use errors::{DockcallError, InvocationError, Result};
pub use executor::{execute, Executor, InvocationOutput};
pub use invocation::{Invocation, InvocationBuilder, PipeMode};
pub use runner::OutputMode;
pub use settings::Settings;

// Re-export IndexMap for use by dependent crates (preserves insertion order for ordered maps)
pub use indexmap::IndexMap;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
