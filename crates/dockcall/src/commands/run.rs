//! Run command implementation
//!
//! Implements `dockcall run`: validates and executes one invocation, then
//! prints any captured output.

use anyhow::Result;
use dockcall_core::executor::Executor;
use dockcall_core::mock::Substitution;
use dockcall_core::{Invocation, OutputMode, Settings};
use std::io::Write;
use tracing::{debug, info, instrument};

/// Run command arguments
#[derive(Debug)]
pub struct RunArgs {
    pub invocation: Invocation,
    pub output: OutputMode,
    pub settings: Settings,
}

/// Execute the run command
#[instrument(skip(args), fields(mode = %args.invocation.mode()))]
pub async fn execute_run(args: RunArgs) -> Result<()> {
    debug!("Run args: {:?}", args);

    let result = Executor::system()
        .execute_async(args.invocation, args.settings, args.output)
        .await?;

    if let Some(substitutions) = &result.substitutions {
        for (name, substitution) in substitutions {
            match substitution {
                Substitution::Existing => info!("Mock: kept existing {}", name),
                Substitution::Placeholder => info!("Mock: wrote placeholder {}", name),
                Substitution::Fetched(url) => info!("Mock: fetched {} from {}", name, url),
            }
        }
    }

    if let Some(stdout) = &result.stdout {
        let mut out = std::io::stdout().lock();
        out.write_all(stdout)?;
        out.flush()?;
    }

    Ok(())
}
