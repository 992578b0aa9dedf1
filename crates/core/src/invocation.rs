//! Invocation descriptors
//!
//! An [`Invocation`] captures one container call, or one chain of calls joined
//! by a pipe: which image(s) run which command(s), the working directory
//! mounted into every container, and the input/output contract checked around
//! the run. Descriptors are built once per call site and consumed by the
//! executor.
//!
//! The pipe-composition mode is never inferred at run time. The builder
//! decides it from the descriptor's shape and records it as a [`Composition`]
//! variant:
//!
//! | images | stages | composition            |
//! |--------|--------|------------------------|
//! | 1      | 0      | `Single` (plain argv)  |
//! | 1      | >= 1   | `SingleContainerPipe`  |
//! | N >= 2 | N      | `MultiContainerPipe`   |
//!
//! Every other combination is a construction error.

use crate::errors::{InvocationError, Result};
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};

/// How the stages of an invocation are chained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    /// One stage, no piping
    None,
    /// All stages run inside one container connected by a shell pipe
    SingleContainerPipe,
    /// Each stage runs in its own container, piped together on the host
    MultiContainerPipe,
}

impl PipeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SingleContainerPipe => "single-container-pipe",
            Self::MultiContainerPipe => "multi-container-pipe",
        }
    }
}

impl std::fmt::Display for PipeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stage of a multi-container pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeStage {
    pub image: String,
    pub fragment: String,
}

/// Image(s) and command segment(s) of an invocation, tagged by pipe mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    /// A single image run with a plain argument list
    Single { image: String, args: Vec<String> },
    /// Shell fragments joined with `|` inside one container
    SingleContainerPipe {
        image: String,
        fragments: Vec<String>,
    },
    /// One container per shell fragment, joined with `|` on the host
    MultiContainerPipe { stages: Vec<PipeStage> },
}

impl Composition {
    pub fn mode(&self) -> PipeMode {
        match self {
            Self::Single { .. } => PipeMode::None,
            Self::SingleContainerPipe { .. } => PipeMode::SingleContainerPipe,
            Self::MultiContainerPipe { .. } => PipeMode::MultiContainerPipe,
        }
    }

    /// Images in stage order, repeats included
    pub fn images(&self) -> Vec<&str> {
        match self {
            Self::Single { image, .. } | Self::SingleContainerPipe { image, .. } => {
                vec![image.as_str()]
            }
            Self::MultiContainerPipe { stages } => {
                stages.iter().map(|s| s.image.as_str()).collect()
            }
        }
    }

    /// Distinct images in first-seen order
    pub fn distinct_images(&self) -> Vec<&str> {
        let set: IndexSet<&str> = self.images().into_iter().collect();
        set.into_iter().collect()
    }
}

/// A fully validated container invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    composition: Composition,
    work_dir: PathBuf,
    env: IndexMap<String, String>,
    inputs: Vec<String>,
    outputs: IndexMap<String, Option<String>>,
    remove_after_run: bool,
    extra_runtime_args: Vec<String>,
}

impl Invocation {
    /// Start building an invocation that mounts `work_dir`
    pub fn builder(work_dir: impl Into<PathBuf>) -> InvocationBuilder {
        InvocationBuilder::new(work_dir)
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn mode(&self) -> PipeMode {
        self.composition.mode()
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn env(&self) -> &IndexMap<String, String> {
        &self.env
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Declared outputs and their optional mock source URLs, in declaration order
    pub fn outputs(&self) -> &IndexMap<String, Option<String>> {
        &self.outputs
    }

    pub fn remove_after_run(&self) -> bool {
        self.remove_after_run
    }

    pub fn extra_runtime_args(&self) -> &[String] {
        &self.extra_runtime_args
    }
}

/// Builder for [`Invocation`]
///
/// `image`/`images` choose the container image(s), `args` sets the argument
/// list of a single unpiped call, and `stage`/`stages` add shell fragments for
/// piped calls. `build` derives the pipe mode and rejects ambiguous shapes.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    images: Vec<String>,
    args: Vec<String>,
    stages: Vec<String>,
    work_dir: PathBuf,
    env: IndexMap<String, String>,
    inputs: Vec<String>,
    outputs: IndexMap<String, Option<String>>,
    remove_after_run: bool,
    extra_runtime_args: Vec<String>,
}

impl InvocationBuilder {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            images: Vec::new(),
            args: Vec::new(),
            stages: Vec::new(),
            work_dir: work_dir.into(),
            env: IndexMap::new(),
            inputs: Vec::new(),
            outputs: IndexMap::new(),
            remove_after_run: true,
            extra_runtime_args: Vec::new(),
        }
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.images.push(image.into());
        self
    }

    pub fn images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images.extend(images.into_iter().map(Into::into));
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stage(mut self, fragment: impl Into<String>) -> Self {
        self.stages.push(fragment.into());
        self
    }

    pub fn stages<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages.extend(fragments.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    /// Declare an output that mock mode fills with placeholder content
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), None);
        self
    }

    /// Declare an output that mock mode fetches from `url`
    pub fn output_from(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), Some(url.into()));
        self
    }

    /// Keep the container after it exits (omit `--rm`)
    pub fn keep_container(mut self) -> Self {
        self.remove_after_run = false;
        self
    }

    pub fn remove_after_run(mut self, remove: bool) -> Self {
        self.remove_after_run = remove;
        self
    }

    pub fn runtime_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_runtime_args.push(arg.into());
        self
    }

    pub fn runtime_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_runtime_args
            .extend(args.into_iter().map(Into::into));
        self
    }

    /// Validate the shape and produce the invocation
    pub fn build(self) -> Result<Invocation> {
        let composition = compose(self.images, self.args, self.stages)?;

        if self.work_dir.as_os_str().is_empty() {
            return Err(construction("working directory must not be empty"));
        }
        let work_dir = if self.work_dir.is_absolute() {
            self.work_dir
        } else {
            std::env::current_dir()
                .map_err(InvocationError::Io)?
                .join(self.work_dir)
        };

        for key in self.env.keys() {
            if key.is_empty() || key.contains('=') {
                return Err(construction(format!(
                    "invalid environment variable name '{}'",
                    key
                )));
            }
        }

        Ok(Invocation {
            composition,
            work_dir,
            env: self.env,
            inputs: self.inputs,
            outputs: self.outputs,
            remove_after_run: self.remove_after_run,
            extra_runtime_args: self.extra_runtime_args,
        })
    }
}

fn construction(message: impl Into<String>) -> crate::errors::DockcallError {
    InvocationError::Construction {
        message: message.into(),
    }
    .into()
}

fn compose(images: Vec<String>, args: Vec<String>, stages: Vec<String>) -> Result<Composition> {
    if images.iter().any(|i| i.trim().is_empty()) {
        return Err(construction("image names must not be empty"));
    }

    if stages.is_empty() {
        return match images.len() {
            1 => Ok(Composition::Single {
                image: images.into_iter().next().unwrap_or_default(),
                args,
            }),
            0 => Err(construction("exactly one image is required")),
            n => Err(construction(format!(
                "{} images given without pipe stages; multiple images require one stage per image",
                n
            ))),
        };
    }

    if !args.is_empty() {
        return Err(construction(
            "an argument list cannot be combined with pipe stages",
        ));
    }

    match images.len() {
        0 => Err(construction("piped invocations require at least one image")),
        1 => Ok(Composition::SingleContainerPipe {
            image: images.into_iter().next().unwrap_or_default(),
            fragments: stages,
        }),
        n if n == stages.len() => Ok(Composition::MultiContainerPipe {
            stages: images
                .into_iter()
                .zip(stages)
                .map(|(image, fragment)| PipeStage { image, fragment })
                .collect(),
        }),
        n => Err(construction(format!(
            "{} images given for {} pipe stages; expected one image or one image per stage",
            n,
            stages.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DockcallError;

    fn is_construction(err: &DockcallError) -> bool {
        matches!(
            err.as_invocation(),
            Some(InvocationError::Construction { .. })
        )
    }

    #[test]
    fn test_single_image_without_stages_is_plain_call() {
        let inv = Invocation::builder("/tmp/job")
            .image("quay.io/ucsc_cgl/samtools")
            .args(["view", "-H", "/data/in.bam"])
            .build()
            .unwrap();
        assert_eq!(inv.mode(), PipeMode::None);
        assert!(inv.remove_after_run());
        assert_eq!(
            inv.composition(),
            &Composition::Single {
                image: "quay.io/ucsc_cgl/samtools".to_string(),
                args: vec![
                    "view".to_string(),
                    "-H".to_string(),
                    "/data/in.bam".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_single_image_with_stages_is_single_container_pipe() {
        let inv = Invocation::builder("/tmp/job")
            .image("ubuntu")
            .stages(["cat in.txt", "gzip"])
            .build()
            .unwrap();
        assert_eq!(inv.mode(), PipeMode::SingleContainerPipe);
        assert_eq!(inv.composition().distinct_images(), vec!["ubuntu"]);
    }

    #[test]
    fn test_one_image_per_stage_is_multi_container_pipe() {
        let inv = Invocation::builder("/tmp/job")
            .images(["ubuntu", "alpine", "ubuntu"])
            .stages(["cat in.txt", "gzip", "md5sum"])
            .build()
            .unwrap();
        assert_eq!(inv.mode(), PipeMode::MultiContainerPipe);
        assert_eq!(
            inv.composition().images(),
            vec!["ubuntu", "alpine", "ubuntu"]
        );
        assert_eq!(
            inv.composition().distinct_images(),
            vec!["ubuntu", "alpine"]
        );
    }

    #[test]
    fn test_ambiguous_arity_is_construction_error() {
        let err = Invocation::builder("/tmp/job")
            .images(["ubuntu", "alpine"])
            .stages(["a", "b", "c"])
            .build()
            .unwrap_err();
        assert!(is_construction(&err));

        let err = Invocation::builder("/tmp/job")
            .images(["ubuntu", "alpine"])
            .arg("--help")
            .build()
            .unwrap_err();
        assert!(is_construction(&err));

        let err = Invocation::builder("/tmp/job").arg("--help").build().unwrap_err();
        assert!(is_construction(&err));
    }

    #[test]
    fn test_args_and_stages_are_exclusive() {
        let err = Invocation::builder("/tmp/job")
            .image("ubuntu")
            .arg("ls")
            .stage("cat x")
            .build()
            .unwrap_err();
        assert!(is_construction(&err));
    }

    #[test]
    fn test_blank_image_and_bad_env_rejected() {
        let err = Invocation::builder("/tmp/job").image("  ").build().unwrap_err();
        assert!(is_construction(&err));

        let err = Invocation::builder("/tmp/job")
            .image("ubuntu")
            .env("A=B", "c")
            .build()
            .unwrap_err();
        assert!(is_construction(&err));
    }

    #[test]
    fn test_relative_work_dir_is_made_absolute() {
        let inv = Invocation::builder("job")
            .image("ubuntu")
            .build()
            .unwrap();
        assert!(inv.work_dir().is_absolute());
        assert!(inv.work_dir().ends_with("job"));
    }

    #[test]
    fn test_outputs_keep_declaration_order() {
        let inv = Invocation::builder("/tmp/job")
            .image("ubuntu")
            .output("b.txt")
            .output_from("a.fa", "https://example.org/a.fa")
            .keep_container()
            .build()
            .unwrap();
        let names: Vec<&str> = inv.outputs().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b.txt", "a.fa"]);
        assert_eq!(
            inv.outputs().get("a.fa").cloned().flatten().as_deref(),
            Some("https://example.org/a.fa")
        );
        assert!(!inv.remove_after_run());
    }
}
