//! Check command implementation

use anyhow::Result;
use dockcall_core::runner::SystemRunner;
use dockcall_core::Settings;
use tracing::info;

/// Verify the configured runtime binary responds to `--version`
pub fn execute_check(settings: &Settings) -> Result<()> {
    let version = SystemRunner::check_runtime(&settings.runtime_path)?;
    info!("Container runtime available: {}", version);
    println!("{}", version);
    Ok(())
}
