//! End-to-end invocation tests against a fake container runtime
//!
//! The fake runtime executes stage commands on the host inside the mounted
//! working directory, so rendering, piping, output checks, and the ownership
//! fix can be exercised without a Docker daemon.

#![cfg(unix)]

mod common;

use anyhow::Result;
use common::{write_random_file, FakeRuntime};
use dockcall_core::errors::InvocationError;
use dockcall_core::{Executor, Invocation, OutputMode, Settings};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn settings(runtime: &FakeRuntime) -> Settings {
    Settings::default().with_runtime_path(runtime.path().to_string_lossy())
}

#[test]
#[serial]
fn test_single_call_captures_environment() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let work = TempDir::new()?;
    let inv = Invocation::builder(work.path())
        .image("ubuntu")
        .env("foo", "bar")
        .args(["printenv", "foo"])
        .build()?;

    let out = Executor::system().execute(&inv, &settings(&runtime), OutputMode::Capture)?;

    assert_eq!(out.stdout_text().as_deref(), Some("bar\n"));
    assert_eq!(runtime.chown_images(), vec!["ubuntu"]);
    Ok(())
}

#[test]
#[serial]
fn test_redirect_to_file() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let work = TempDir::new()?;
    let inv = Invocation::builder(work.path())
        .image("ubuntu")
        .env("foo", "bar")
        .args(["printenv", "foo"])
        .build()?;

    let target = work.path().join("test");
    let file = fs::File::create(&target)?;
    Executor::system().execute(&inv, &settings(&runtime), OutputMode::Redirect(file))?;

    assert_eq!(fs::read_to_string(&target)?, "bar\n");
    Ok(())
}

#[test]
#[serial]
fn test_single_and_multi_container_pipes_agree() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let work = TempDir::new()?;
    write_random_file(&work.path().join("random.bin"), 64 * 1024)?;
    let stages = ["cat random.bin", "gzip", "gunzip", "cksum"];

    let single = Invocation::builder(work.path())
        .image("ubuntu")
        .stages(stages)
        .input("random.bin")
        .build()?;
    let multi = Invocation::builder(work.path())
        .images(["ubuntu", "alpine", "ubuntu", "busybox"])
        .stages(stages)
        .input("random.bin")
        .build()?;

    let executor = Executor::system();
    let single_out = executor.execute(&single, &settings(&runtime), OutputMode::Capture)?;
    let multi_out = executor.execute(&multi, &settings(&runtime), OutputMode::Capture)?;

    let checksum = single_out.stdout_text().unwrap_or_default();
    assert!(!checksum.trim().is_empty());
    assert_eq!(Some(checksum), multi_out.stdout_text());

    // One fix for the single-container run, then one per distinct image
    assert_eq!(
        runtime.chown_images(),
        vec!["ubuntu", "ubuntu", "alpine", "busybox"]
    );
    Ok(())
}

#[test]
#[serial]
fn test_capture_merged_includes_stderr() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let work = TempDir::new()?;
    let inv = Invocation::builder(work.path())
        .image("ubuntu")
        .stage("echo out; echo err 1>&2")
        .build()?;

    let out = Executor::system().execute(&inv, &settings(&runtime), OutputMode::CaptureMerged)?;

    assert_eq!(out.stdout_text().as_deref(), Some("out\nerr\n"));
    Ok(())
}

#[test]
#[serial]
fn test_missing_output_after_successful_run() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let work = TempDir::new()?;
    let inv = Invocation::builder(work.path())
        .image("ubuntu")
        .args(["touch", "other.vcf"])
        .output("out.vcf")
        .build()?;

    let err = Executor::system()
        .execute(&inv, &settings(&runtime), OutputMode::Discard)
        .unwrap_err();

    match err.as_invocation() {
        Some(InvocationError::MissingOutput { path }) => {
            assert_eq!(path, &work.path().join("out.vcf"))
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(work.path().join("other.vcf").is_file());
    assert_eq!(runtime.chown_images(), vec!["ubuntu"]);
    Ok(())
}

#[test]
#[serial]
fn test_failed_stage_still_normalizes_ownership() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let work = TempDir::new()?;
    let inv = Invocation::builder(work.path())
        .images(["ubuntu", "alpine"])
        .stages(["exit 3", "cat"])
        .build()?;

    let err = Executor::system()
        .execute(&inv, &settings(&runtime), OutputMode::Discard)
        .unwrap_err();

    match err.as_invocation() {
        Some(InvocationError::Execution {
            exit_code,
            work_dir,
            ..
        }) => {
            assert_eq!(*exit_code, Some(3));
            assert_eq!(work_dir, work.path());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(runtime.chown_images(), vec!["ubuntu", "alpine"]);
    Ok(())
}

#[test]
#[serial]
fn test_missing_input_never_starts_a_container() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let work = TempDir::new()?;
    let inv = Invocation::builder(work.path())
        .image("ubuntu")
        .args(["cat", "ref.fa"])
        .input("ref.fa")
        .build()?;

    let err = Executor::system()
        .execute(&inv, &settings(&runtime), OutputMode::Discard)
        .unwrap_err();

    assert!(matches!(
        err.as_invocation(),
        Some(InvocationError::MissingInput { .. })
    ));
    assert!(runtime.calls().is_empty());
    Ok(())
}

#[test]
#[serial]
fn test_check_runtime_reports_version() -> Result<()> {
    let runtime = FakeRuntime::install()?;
    let version =
        dockcall_core::runner::SystemRunner::check_runtime(&runtime.path().to_string_lossy())?;
    assert!(version.contains("Fake runtime"));
    Ok(())
}
