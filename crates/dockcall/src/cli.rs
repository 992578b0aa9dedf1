use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dockcall_core::errors::InvocationError;
use dockcall_core::settings::{Settings, SettingsFile, SettingsOverrides};
use dockcall_core::{Invocation, OutputMode};
use std::fs::File;
use std::path::PathBuf;

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Invocation descriptor flags shared by `run` and `render`
#[derive(Args, Debug, Clone)]
pub struct InvocationArgs {
    /// Container image; repeat once per stage for a multi-container pipe
    #[arg(long = "image", value_name = "IMAGE", required = true)]
    pub images: Vec<String>,

    /// Host working directory mounted into the container
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub work_dir: PathBuf,

    /// Environment variable for the container (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// File that must exist in the working directory before the run (repeatable)
    #[arg(long = "input", value_name = "NAME")]
    pub inputs: Vec<String>,

    /// File that must exist after the run; in mock mode it is fetched from URL if given (repeatable)
    #[arg(long = "output", value_name = "NAME[=URL]")]
    pub outputs: Vec<String>,

    /// Pipe stage command fragment (repeatable)
    #[arg(long = "stage", value_name = "FRAGMENT")]
    pub stages: Vec<String>,

    /// Keep the container after it exits instead of passing --rm
    #[arg(long)]
    pub keep: bool,

    /// Extra argument passed to the runtime before the image (repeatable)
    #[arg(long = "runtime-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub runtime_args: Vec<String>,

    /// Tool arguments for a single call, after `--`
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl InvocationArgs {
    /// Build the invocation descriptor
    pub fn to_invocation(&self) -> dockcall_core::Result<Invocation> {
        let mut builder = Invocation::builder(&self.work_dir)
            .images(self.images.iter().cloned())
            .args(self.args.iter().cloned())
            .stages(self.stages.iter().cloned())
            .runtime_args(self.runtime_args.iter().cloned())
            .remove_after_run(!self.keep);

        for (key, value) in &self.env {
            builder = builder.env(key.as_str(), value.as_str());
        }
        for name in &self.inputs {
            builder = builder.input(name.as_str());
        }
        for spec in &self.outputs {
            builder = match spec.split_once('=') {
                Some((name, url)) if !url.is_empty() => builder.output_from(name, url),
                Some((name, _)) => builder.output(name),
                None => builder.output(spec.as_str()),
            };
        }
        builder.build()
    }
}

/// Where `run` sends the container's stdout
#[derive(Args, Debug, Clone)]
#[group(multiple = false)]
pub struct OutputArgs {
    /// Capture stdout and print it once the run has been verified
    #[arg(long)]
    pub capture: bool,

    /// Capture stdout and stderr interleaved
    #[arg(long)]
    pub capture_merged: bool,

    /// Write stdout to a file
    #[arg(long, value_name = "PATH")]
    pub stdout_file: Option<PathBuf>,

    /// Discard stdout
    #[arg(long)]
    pub quiet: bool,
}

impl OutputArgs {
    pub fn to_output_mode(&self) -> Result<OutputMode> {
        Ok(if self.capture {
            OutputMode::Capture
        } else if self.capture_merged {
            OutputMode::CaptureMerged
        } else if let Some(path) = &self.stdout_file {
            OutputMode::Redirect(File::create(path)?)
        } else if self.quiet {
            OutputMode::Discard
        } else {
            OutputMode::Inherit
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check inputs, run an invocation, fix ownership, and check outputs
    Run {
        #[command(flatten)]
        invocation: InvocationArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the runtime command(s) an invocation would run, without running them
    Render {
        #[command(flatten)]
        invocation: InvocationArgs,

        /// Also print the ownership-fix commands run after the invocation
        #[arg(long)]
        with_ownership_fix: bool,
    },

    /// Verify the container runtime binary is available
    Check,
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Run commands in containers against a mounted working directory",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Log format (text or json, defaults to text, can be set via DOCKCALL_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// TOML settings file
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Synthesize declared outputs instead of running containers
    #[arg(long, global = true)]
    pub mock: bool,

    /// Container runtime binary (overrides DOCKCALL_RUNTIME)
    #[arg(long, global = true, value_name = "PATH")]
    pub runtime_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Initialize logging, resolve settings, and run the selected subcommand
    pub async fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };
        let log_level = self.log_level.as_str();

        if std::env::var_os(dockcall_core::logging::LOG_ENV).is_none()
            && std::env::var_os("RUST_LOG").is_none()
        {
            std::env::set_var(
                "RUST_LOG",
                format!("dockcall={},dockcall_core={}", log_level, log_level),
            );
        }
        dockcall_core::logging::init(log_format)?;
        tracing::debug!("CLI initialized with log level: {}", log_level);

        let settings = self.resolve_settings()?;

        match self.command {
            Commands::Run { invocation, output } => {
                use crate::commands::run::{execute_run, RunArgs};

                execute_run(RunArgs {
                    invocation: invocation.to_invocation()?,
                    output: output.to_output_mode()?,
                    settings,
                })
                .await
            }
            Commands::Render {
                invocation,
                with_ownership_fix,
            } => {
                use crate::commands::render::{execute_render, RenderArgs};

                execute_render(RenderArgs {
                    invocation: invocation.to_invocation()?,
                    with_ownership_fix,
                    settings,
                })
            }
            Commands::Check => crate::commands::check::execute_check(&settings),
        }
    }

    fn resolve_settings(&self) -> Result<Settings> {
        let file = self
            .settings
            .as_deref()
            .map(SettingsFile::load)
            .transpose()?;
        let overrides = SettingsOverrides {
            mock: self.mock.then_some(true),
            runtime_path: self.runtime_path.clone(),
        };
        Ok(Settings::resolve(overrides, file)?)
    }
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Process exit code for errors that carry one
pub fn exit_code_for(err: &anyhow::Error) -> Option<i32> {
    let invocation = err
        .downcast_ref::<dockcall_core::DockcallError>()
        .and_then(|e| e.as_invocation())
        .or_else(|| err.downcast_ref::<InvocationError>())?;

    match invocation {
        InvocationError::Construction { .. }
        | InvocationError::MissingInput { .. }
        | InvocationError::MissingOutput { .. } => Some(2),
        InvocationError::Execution {
            exit_code: Some(code),
            ..
        } if *code != 0 => Some(*code),
        _ => None,
    }
}
