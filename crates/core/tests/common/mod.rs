//! Shared test helpers for core integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stand-in for the container runtime CLI
///
/// Understands the subset of `docker run` that rendered invocations use: it
/// changes into the host side of the `-v` mount, exports `-e` variables, and
/// executes the entrypoint or command on the host. Ownership-fix calls are
/// logged and succeed without changing anything.
pub struct FakeRuntime {
    dir: TempDir,
}

const SCRIPT: &str = r#"#!/bin/bash
entry=""
while [ $# -gt 0 ]; do
  case "$1" in
    --version) echo "Fake runtime version 1.0"; exit 0;;
    run) shift;;
    -v) cd "${2%%:*}" || exit 125; shift 2;;
    -e) export "$2"; shift 2;;
    --entrypoint=*) entry="${1#--entrypoint=}"; shift;;
    -*) shift;;
    *) break;;
  esac
done
image="$1"; shift
echo "$entry $image" >> "__LOG__"
if [ "$entry" = chown ]; then exit 0; fi
if [ -n "$entry" ]; then exec "$entry" "$@"; fi
exec "$@"
"#;

impl FakeRuntime {
    pub fn install() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let runtime = Self { dir };
        let script = SCRIPT.replace("__LOG__", &runtime.log_path().to_string_lossy());
        fs::write(runtime.path(), script)?;
        make_executable(&runtime.path())?;
        fs::write(runtime.log_path(), "")?;
        Ok(runtime)
    }

    /// Path to pass as the runtime binary
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("docker")
    }

    fn log_path(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    /// One `"<entrypoint> <image>"` line per container started
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Images the ownership fix ran with, in call order
    pub fn chown_images(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|line| line.strip_prefix("chown "))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Write `len` pseudo-random bytes to `path`
pub fn write_random_file(path: &Path, len: usize) -> std::io::Result<()> {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let bytes: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
    fs::write(path, bytes)
}
