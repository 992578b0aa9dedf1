//! Pre- and postcondition checks on the working directory

use crate::errors::{InvocationError, Result};
use crate::invocation::Invocation;
use std::path::PathBuf;
use tracing::debug;

/// Confirm every declared input is a regular file in the working directory
///
/// Fails with `MissingInput` naming the first absent file. Never spawns a
/// process and never writes to the working directory.
pub fn check_inputs(invocation: &Invocation) -> Result<()> {
    let work_dir = invocation.work_dir();
    for name in invocation.inputs() {
        if !work_dir.join(name).is_file() {
            return Err(InvocationError::MissingInput {
                name: name.clone(),
                work_dir: work_dir.to_path_buf(),
            }
            .into());
        }
    }
    debug!(count = invocation.inputs().len(), "Inputs present");
    Ok(())
}

/// Where a declared output is expected on the host
///
/// Relative names resolve against the working directory, absolute names are
/// used as-is.
pub fn output_path(invocation: &Invocation, name: &str) -> PathBuf {
    let path = PathBuf::from(name);
    if path.is_absolute() {
        path
    } else {
        invocation.work_dir().join(path)
    }
}

/// Confirm every declared output is a regular file after a successful run
pub fn check_outputs(invocation: &Invocation) -> Result<()> {
    for name in invocation.outputs().keys() {
        let path = output_path(invocation, name);
        if !path.is_file() {
            return Err(InvocationError::MissingOutput { path }.into());
        }
    }
    debug!(count = invocation.outputs().len(), "Outputs present");
    Ok(())
}
