//! Mock output substitution
//!
//! In mock mode no container runs. Declared outputs are materialized in the
//! working directory instead so downstream steps see the same files they
//! would after a real run.

use crate::download::Downloader;
use crate::errors::{InvocationError, Result};
use crate::invocation::Invocation;
use crate::validate::output_path;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, info, instrument};

/// Content written to outputs that have no source URL
pub const MOCK_PLACEHOLDER: &[u8] = b"contents";

/// What happened to one declared output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// The file already existed and was left alone
    Existing,
    /// A placeholder file was created
    Placeholder,
    /// The file was fetched from the given URL
    Fetched(String),
}

/// Materialize every declared output that does not exist yet
///
/// Outputs are processed in declaration order; the first failure aborts.
#[instrument(skip_all, fields(work_dir = %invocation.work_dir().display()))]
pub fn substitute_outputs(
    invocation: &Invocation,
    downloader: &dyn Downloader,
) -> Result<Vec<(String, Substitution)>> {
    let mut report = Vec::with_capacity(invocation.outputs().len());

    for (name, url) in invocation.outputs() {
        let path = output_path(invocation, name);
        let outcome = if path.exists() {
            Substitution::Existing
        } else if let Some(url) = url {
            let dest_dir = path.parent().unwrap_or_else(|| invocation.work_dir());
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| InvocationError::Construction {
                    message: format!("output '{}' has no file name", name),
                })?;
            downloader.fetch(url, dest_dir, &file_name)?;
            Substitution::Fetched(url.clone())
        } else {
            // Never clobber a file that appeared since the existence check
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(InvocationError::Io)?;
            file.write_all(MOCK_PLACEHOLDER)
                .map_err(InvocationError::Io)?;
            Substitution::Placeholder
        };

        debug!(output = %name, outcome = ?outcome, "Mock output");
        report.push((name.clone(), outcome));
    }

    info!(
        "Mock mode: substituted {} declared output(s) without running a container",
        report.len()
    );
    Ok(report)
}
