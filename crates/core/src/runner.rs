//! Process execution seam
//!
//! The executor never spawns processes itself; it hands rendered commands to
//! a [`ProcessRunner`]. [`SystemRunner`] runs them on the host with
//! `std::process::Command`, and [`mock::RecordingRunner`] records them for
//! tests without a container runtime.

use crate::command::RenderedCommand;
use crate::errors::{DockcallError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use tracing::{debug, instrument};

/// Where the output of a runtime call goes
#[derive(Debug, Default)]
pub enum OutputMode {
    /// Share the caller's stdout/stderr
    #[default]
    Inherit,
    /// Drop stdout
    Discard,
    /// Write stdout to a caller-supplied file
    Redirect(File),
    /// Return stdout
    Capture,
    /// Return stdout and stderr interleaved in one stream
    CaptureMerged,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inherit => "inherit",
            Self::Discard => "discard",
            Self::Redirect(_) => "redirect",
            Self::Capture => "capture",
            Self::CaptureMerged => "capture-merged",
        }
    }

    pub fn captures(&self) -> bool {
        matches!(self, Self::Capture | Self::CaptureMerged)
    }
}

/// Exit status and optional captured output of a finished process chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Captured bytes for the capture modes
    pub stdout: Option<Vec<u8>>,
}

/// Spawns rendered commands and blocks until they finish
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion. Errors are launch/transport failures only;
    /// a non-zero exit is reported through [`ProcessOutput::success`].
    fn run(&self, command: &RenderedCommand, output: OutputMode) -> std::io::Result<ProcessOutput>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(&self, command: &RenderedCommand, output: OutputMode) -> std::io::Result<ProcessOutput> {
        (**self).run(command, output)
    }
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for Box<T> {
    fn run(&self, command: &RenderedCommand, output: OutputMode) -> std::io::Result<ProcessOutput> {
        (**self).run(command, output)
    }
}

/// Runs commands on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(rendered: &RenderedCommand) -> Command {
        match rendered {
            RenderedCommand::Argv { program, args } => {
                let mut command = Command::new(program);
                command.args(args);
                command
            }
            RenderedCommand::Shell { shell, script } => {
                let mut command = Command::new(shell);
                command.args(["-o", "pipefail", "-c", script.as_str()]);
                command
            }
        }
    }

    /// Check that the runtime binary is installed and return its version line
    #[instrument]
    pub fn check_runtime(runtime_path: &str) -> Result<String> {
        debug!(
            "Checking if container runtime binary is installed at: {}",
            runtime_path
        );

        let output = Command::new(runtime_path)
            .arg("--version")
            .output()
            .map_err(|e| {
                DockcallError::Runtime(format!(
                    "{} is not installed or not accessible: {}",
                    runtime_path, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockcallError::Runtime(format!(
                "Runtime version check failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, rendered: &RenderedCommand, output: OutputMode) -> std::io::Result<ProcessOutput> {
        let mut command = Self::command(rendered);
        debug!(mode = output.as_str(), "Spawning: {}", rendered);

        match output {
            OutputMode::Inherit => {
                let status = command.status()?;
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    success: status.success(),
                    stdout: None,
                })
            }
            OutputMode::Discard => {
                let status = command.stdout(Stdio::null()).status()?;
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    success: status.success(),
                    stdout: None,
                })
            }
            OutputMode::Redirect(file) => {
                let status = command.stdout(Stdio::from(file)).status()?;
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    success: status.success(),
                    stdout: None,
                })
            }
            OutputMode::Capture => {
                let out = command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .output()?;
                Ok(ProcessOutput {
                    exit_code: out.status.code(),
                    success: out.status.success(),
                    stdout: Some(out.stdout),
                })
            }
            OutputMode::CaptureMerged => {
                // Both streams share one file description so ordering is kept
                let mut sink = tempfile::tempfile()?;
                let status = command
                    .stdout(Stdio::from(sink.try_clone()?))
                    .stderr(Stdio::from(sink.try_clone()?))
                    .status()?;
                let mut merged = Vec::new();
                sink.seek(SeekFrom::Start(0))?;
                sink.read_to_end(&mut merged)?;
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    success: status.success(),
                    stdout: Some(merged),
                })
            }
        }
    }
}

pub mod mock {
    //! Recording process runner for tests
    //!
    //! Records every command it is asked to run and answers with configurable
    //! responses, so invocation flows can be exercised without a container
    //! runtime.

    use super::{OutputMode, ProcessOutput, ProcessRunner};
    use crate::command::RenderedCommand;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Canned answer for a command
    #[derive(Debug, Clone)]
    pub struct MockResponse {
        /// Exit code to report
        pub exit_code: i32,
        /// Bytes written to stdout
        pub stdout: Option<String>,
        /// Simulate a launch failure instead of running
        pub launch_error: bool,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            Self {
                exit_code: 0,
                stdout: None,
                launch_error: false,
            }
        }
    }

    impl MockResponse {
        pub fn success() -> Self {
            Self::default()
        }

        pub fn failure(exit_code: i32) -> Self {
            Self {
                exit_code,
                ..Self::default()
            }
        }

        pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
            self.stdout = Some(stdout.into());
            self
        }

        pub fn launch_error() -> Self {
            Self {
                exit_code: -1,
                stdout: None,
                launch_error: true,
            }
        }
    }

    /// Record of one call for verification in tests
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub command: RenderedCommand,
        pub output_mode: &'static str,
    }

    impl RecordedCall {
        pub fn line(&self) -> String {
            self.command.to_shell_line()
        }

        /// Runtime arguments of a direct call; empty for shell pipelines
        pub fn args(&self) -> &[String] {
            match &self.command {
                RenderedCommand::Argv { args, .. } => args,
                RenderedCommand::Shell { .. } => &[],
            }
        }

        /// Whether this is an ownership-fix call
        pub fn is_ownership_fix(&self) -> bool {
            self.args().iter().any(|a| a == "--entrypoint=chown")
        }

        /// Image an ownership-fix call runs with
        pub fn ownership_image(&self) -> Option<&str> {
            let args = self.args();
            args.iter()
                .position(|a| a == "--entrypoint=chown")
                .and_then(|i| args.get(i + 1))
                .map(String::as_str)
        }
    }

    #[derive(Debug, Default)]
    struct State {
        default_response: MockResponse,
        /// First matching substring wins
        responses: Vec<(String, MockResponse)>,
        history: Vec<RecordedCall>,
    }

    /// Process runner that records calls instead of spawning processes
    #[derive(Debug, Clone, Default)]
    pub struct RecordingRunner {
        state: Arc<Mutex<State>>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        /// Answer every command whose rendered line contains `pattern` with `response`
        pub fn respond_to(&self, pattern: impl Into<String>, response: MockResponse) {
            self.state().responses.push((pattern.into(), response));
        }

        pub fn set_default_response(&self, response: MockResponse) {
            self.state().default_response = response;
        }

        pub fn history(&self) -> Vec<RecordedCall> {
            self.state().history.clone()
        }

        pub fn call_count(&self) -> usize {
            self.state().history.len()
        }

        /// Recorded ownership-fix calls, in order
        pub fn ownership_fixes(&self) -> Vec<RecordedCall> {
            self.history()
                .into_iter()
                .filter(RecordedCall::is_ownership_fix)
                .collect()
        }

        pub fn clear_history(&self) {
            self.state().history.clear();
        }
    }

    impl ProcessRunner for RecordingRunner {
        fn run(
            &self,
            command: &RenderedCommand,
            output: OutputMode,
        ) -> std::io::Result<ProcessOutput> {
            let line = command.to_shell_line();
            let response = {
                let mut state = self.state();
                state.history.push(RecordedCall {
                    command: command.clone(),
                    output_mode: output.as_str(),
                });
                state
                    .responses
                    .iter()
                    .find(|(pattern, _)| line.contains(pattern.as_str()))
                    .map(|(_, r)| r.clone())
                    .unwrap_or_else(|| state.default_response.clone())
            };

            if response.launch_error {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "mock launch failure",
                ));
            }

            let bytes = response.stdout.unwrap_or_default().into_bytes();
            let stdout = match output {
                OutputMode::Capture | OutputMode::CaptureMerged => Some(bytes),
                OutputMode::Redirect(mut file) => {
                    file.write_all(&bytes)?;
                    None
                }
                OutputMode::Inherit | OutputMode::Discard => None,
            };

            Ok(ProcessOutput {
                exit_code: Some(response.exit_code),
                success: response.exit_code == 0,
                stdout,
            })
        }
    }
}
