//! Invocation executor
//!
//! Runs one [`Invocation`] end to end:
//!
//! 1. render the command (construction problems were already rejected by the builder)
//! 2. check declared inputs; nothing has been spawned yet
//! 3. mock mode: substitute outputs; real mode: run the command under an
//!    [`OwnershipGuard`] so ownership is normalized on every exit path
//! 4. on success, check declared outputs
//!
//! Mock mode comes from the [`Settings`] passed to each call and is read once
//! per call.

use crate::command::{render, RenderedCommand};
use crate::download::{Downloader, HttpDownloader};
use crate::errors::{DockcallError, InvocationError, Result};
use crate::invocation::Invocation;
use crate::mock::{substitute_outputs, Substitution};
use crate::ownership::OwnershipGuard;
use crate::runner::{OutputMode, ProcessRunner, SystemRunner};
use crate::settings::Settings;
use crate::validate::{check_inputs, check_outputs};
use tracing::{info, instrument, warn};

/// Result of a successful invocation
#[derive(Debug, Clone)]
pub struct InvocationOutput {
    /// The command that ran, or would have run in mock mode
    pub command: RenderedCommand,
    /// Captured output for the capture modes
    pub stdout: Option<Vec<u8>>,
    /// Per-output substitutions when running in mock mode
    pub substitutions: Option<Vec<(String, Substitution)>>,
}

impl InvocationOutput {
    pub fn mocked(&self) -> bool {
        self.substitutions.is_some()
    }

    /// Captured output decoded lossily as UTF-8
    pub fn stdout_text(&self) -> Option<String> {
        self.stdout
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
    }
}

/// Runs invocations through a process runner and a download collaborator
#[derive(Debug, Clone)]
pub struct Executor<R = SystemRunner, D = HttpDownloader> {
    runner: R,
    downloader: D,
}

impl Executor {
    /// Executor that spawns real processes and fetches over HTTP
    pub fn system() -> Self {
        Self::new(SystemRunner::new(), HttpDownloader::new())
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::system()
    }
}

impl<R: ProcessRunner, D: Downloader> Executor<R, D> {
    pub fn new(runner: R, downloader: D) -> Self {
        Self { runner, downloader }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `invocation` and block until it finishes
    #[instrument(skip_all, fields(
        mode = %invocation.mode(),
        work_dir = %invocation.work_dir().display(),
        mock = settings.mock,
    ))]
    pub fn execute(
        &self,
        invocation: &Invocation,
        settings: &Settings,
        output: OutputMode,
    ) -> Result<InvocationOutput> {
        let command = render(invocation, settings);
        check_inputs(invocation)?;

        if settings.mock {
            let substitutions = substitute_outputs(invocation, &self.downloader)?;
            check_outputs(invocation)?;
            return Ok(InvocationOutput {
                command,
                stdout: None,
                substitutions: Some(substitutions),
            });
        }

        info!("RUNNING container(s) with command: {}", command);

        let guard = OwnershipGuard::arm(invocation, settings, &self.runner);
        match self.run(invocation, &command, output) {
            Ok(stdout) => {
                guard.release()?;
                check_outputs(invocation)?;
                Ok(InvocationOutput {
                    command,
                    stdout,
                    substitutions: None,
                })
            }
            Err(err) => {
                if let Err(cleanup) = guard.release() {
                    warn!("Ignoring ownership fix failure after failed run: {}", cleanup);
                }
                Err(err)
            }
        }
    }

    fn run(
        &self,
        invocation: &Invocation,
        command: &RenderedCommand,
        output: OutputMode,
    ) -> Result<Option<Vec<u8>>> {
        let execution_error = |exit_code, source| InvocationError::Execution {
            command: command.to_shell_line(),
            work_dir: invocation.work_dir().to_path_buf(),
            exit_code,
            source,
        };

        let result = self
            .runner
            .run(command, output)
            .map_err(|e| execution_error(None, Some(e)))?;

        if !result.success {
            return Err(execution_error(result.exit_code, None).into());
        }
        Ok(result.stdout)
    }
}

impl<R, D> Executor<R, D>
where
    R: ProcessRunner + Clone + 'static,
    D: Downloader + Clone + 'static,
{
    /// Run `invocation` on tokio's blocking pool
    pub async fn execute_async(
        &self,
        invocation: Invocation,
        settings: Settings,
        output: OutputMode,
    ) -> Result<InvocationOutput> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.execute(&invocation, &settings, output))
            .await
            .map_err(|e| DockcallError::Runtime(format!("Task join error: {}", e)))?
    }
}

/// Run `invocation` with the system runner and HTTP downloader
pub fn execute(
    invocation: &Invocation,
    settings: &Settings,
    output: OutputMode,
) -> Result<InvocationOutput> {
    Executor::system().execute(invocation, settings, output)
}
