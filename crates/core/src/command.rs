//! Command rendering
//!
//! Turns an [`Invocation`] into the literal runtime command line(s). Each
//! composition variant has its own rendering function; nothing here touches
//! the filesystem or spawns processes.

use crate::invocation::{Composition, Invocation, PipeStage};
use crate::settings::Settings;

/// Entrypoint used for piped stages
pub const PIPE_ENTRYPOINT: &str = "/bin/bash";

/// A command ready to hand to a process runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedCommand {
    /// Spawned directly, no shell involved
    Argv { program: String, args: Vec<String> },
    /// Run as `<shell> -o pipefail -c <script>`
    Shell { shell: String, script: String },
}

impl RenderedCommand {
    /// The command as a single POSIX shell line
    pub fn to_shell_line(&self) -> String {
        match self {
            Self::Argv { program, args } => {
                let mut words = Vec::with_capacity(args.len() + 1);
                words.push(program.as_str());
                words.extend(args.iter().map(String::as_str));
                shell_words::join(words)
            }
            Self::Shell { script, .. } => script.clone(),
        }
    }

    pub fn is_shell(&self) -> bool {
        matches!(self, Self::Shell { .. })
    }
}

impl std::fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_shell_line())
    }
}

/// Runtime arguments shared by every container started for one invocation
///
/// `run --log-driver=<driver> -v <workDir>:<mount> [--rm] [-e K=V]... [extra...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunBase {
    pub runtime: String,
    pub args: Vec<String>,
}

impl RunBase {
    pub fn new(invocation: &Invocation, settings: &Settings) -> Self {
        let mut args = vec!["run".to_string()];
        if let Some(driver) = &settings.log_driver {
            args.push(format!("--log-driver={}", driver));
        }
        args.push("-v".to_string());
        args.push(format!(
            "{}:{}",
            invocation.work_dir().display(),
            settings.mount_point
        ));
        if invocation.remove_after_run() {
            args.push("--rm".to_string());
        }
        for (key, value) in invocation.env() {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.extend(invocation.extra_runtime_args().iter().cloned());

        Self {
            runtime: settings.runtime_path.clone(),
            args,
        }
    }

    fn argv<I>(&self, tail: I) -> RenderedCommand
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = self.args.clone();
        args.extend(tail);
        RenderedCommand::Argv {
            program: self.runtime.clone(),
            args,
        }
    }
}

/// Render the command that runs `invocation`
pub fn render(invocation: &Invocation, settings: &Settings) -> RenderedCommand {
    let base = RunBase::new(invocation, settings);
    match invocation.composition() {
        Composition::Single { image, args } => render_single(&base, image, args),
        Composition::SingleContainerPipe { image, fragments } => {
            render_single_container_pipe(&base, image, fragments)
        }
        Composition::MultiContainerPipe { stages } => {
            render_multi_container_pipe(&base, stages, &settings.host_shell)
        }
    }
}

fn render_single(base: &RunBase, image: &str, args: &[String]) -> RenderedCommand {
    base.argv(std::iter::once(image.to_string()).chain(args.iter().cloned()))
}

fn shell_stage(image: &str, fragment: &str) -> Vec<String> {
    vec![
        format!("--entrypoint={}", PIPE_ENTRYPOINT),
        image.to_string(),
        "-o".to_string(),
        "pipefail".to_string(),
        "-c".to_string(),
        fragment.to_string(),
    ]
}

fn render_single_container_pipe(
    base: &RunBase,
    image: &str,
    fragments: &[String],
) -> RenderedCommand {
    base.argv(shell_stage(image, &fragments.join(" | ")))
}

fn render_multi_container_pipe(
    base: &RunBase,
    stages: &[PipeStage],
    host_shell: &str,
) -> RenderedCommand {
    let script = stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let mut tail = Vec::new();
            // Later stages read the previous stage's stdout
            if i > 0 {
                tail.push("-i".to_string());
            }
            tail.extend(shell_stage(&stage.image, &stage.fragment));
            base.argv(tail).to_shell_line()
        })
        .collect::<Vec<_>>()
        .join(" | ");

    RenderedCommand::Shell {
        shell: host_shell.to_string(),
        script,
    }
}

/// Render the `chown -R uid:gid <mount>` call run with `image`
pub fn render_ownership_fix(
    invocation: &Invocation,
    settings: &Settings,
    image: &str,
    uid: u32,
    gid: u32,
) -> RenderedCommand {
    let base = RunBase::new(invocation, settings);
    base.argv([
        "--entrypoint=chown".to_string(),
        image.to_string(),
        "-R".to_string(),
        format!("{}:{}", uid, gid),
        settings.mount_point.clone(),
    ])
}
