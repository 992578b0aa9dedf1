//! Ownership normalization of the mounted working directory
//!
//! Container processes usually run as a different user than the host caller,
//! so files they write into the mount can end up unreadable on the host.
//! After every real run, one `chown -R <uid>:<gid> <mount>` call is issued per
//! distinct image of the invocation, with uid/gid taken from the working
//! directory's owner on the host.
//!
//! [`OwnershipGuard`] ties that fix-up to a scope: it is armed before the
//! runtime call and fires on every exit path, including unwinding.

use crate::command::render_ownership_fix;
use crate::errors::{InvocationError, Result};
use crate::invocation::Invocation;
use crate::runner::{OutputMode, ProcessRunner};
use crate::settings::Settings;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Owning user and group of a host path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostOwner {
    pub uid: u32,
    pub gid: u32,
}

impl HostOwner {
    #[cfg(unix)]
    pub fn of(path: &Path) -> std::io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            uid: metadata.uid(),
            gid: metadata.gid(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(path: &Path) -> std::io::Result<Self> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("cannot read owner of {} on this platform", path.display()),
        ))
    }
}

/// Run the ownership fix once per distinct image
///
/// Every image is attempted even if an earlier one fails; the first failure
/// is returned.
#[instrument(skip_all, fields(work_dir = %invocation.work_dir().display()))]
pub fn normalize_ownership(
    invocation: &Invocation,
    settings: &Settings,
    runner: &dyn ProcessRunner,
) -> Result<()> {
    let work_dir = invocation.work_dir();
    let images = invocation.composition().distinct_images();

    let owner = HostOwner::of(work_dir).map_err(|e| InvocationError::Cleanup {
        image: images.join(","),
        work_dir: work_dir.to_path_buf(),
        message: format!("cannot stat working directory: {}", e),
    })?;

    let mut first_error: Option<InvocationError> = None;
    for image in images {
        let command = render_ownership_fix(invocation, settings, image, owner.uid, owner.gid);
        debug!("Normalizing ownership: {}", command);

        let failure = match runner.run(&command, OutputMode::Discard) {
            Ok(out) if out.success => None,
            Ok(out) => Some(format!(
                "chown exited with {}",
                out.exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            )),
            Err(e) => Some(e.to_string()),
        };

        if let Some(message) = failure {
            warn!(image = %image, "Ownership fix failed: {}", message);
            first_error.get_or_insert(InvocationError::Cleanup {
                image: image.to_string(),
                work_dir: work_dir.to_path_buf(),
                message,
            });
        }
    }

    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Scoped ownership fix-up around a real runtime call
///
/// Call [`OwnershipGuard::release`] to run the fix and observe its result. If
/// the guard is dropped without being released, the fix still runs and any
/// failure is logged.
pub struct OwnershipGuard<'a> {
    invocation: &'a Invocation,
    settings: &'a Settings,
    runner: &'a dyn ProcessRunner,
    armed: bool,
}

impl<'a> OwnershipGuard<'a> {
    pub fn arm(
        invocation: &'a Invocation,
        settings: &'a Settings,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            invocation,
            settings,
            runner,
            armed: true,
        }
    }

    /// Run the fix now and return its result
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        normalize_ownership(self.invocation, self.settings, self.runner)
    }
}

impl Drop for OwnershipGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(e) = normalize_ownership(self.invocation, self.settings, self.runner) {
            warn!("Ownership fix after abandoned run failed: {}", e);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::mock::{MockResponse, RecordingRunner};
    use tempfile::TempDir;

    fn multi_image_invocation(dir: &TempDir) -> Invocation {
        Invocation::builder(dir.path())
            .images(["ubuntu", "alpine", "ubuntu"])
            .stages(["cat a", "gzip", "wc -c"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_host_owner_matches_metadata() {
        use std::os::unix::fs::MetadataExt;
        let dir = TempDir::new().unwrap();
        let owner = HostOwner::of(dir.path()).unwrap();
        let metadata = std::fs::metadata(dir.path()).unwrap();
        assert_eq!(owner.uid, metadata.uid());
        assert_eq!(owner.gid, metadata.gid());
    }

    #[test]
    fn test_one_call_per_distinct_image() {
        let dir = TempDir::new().unwrap();
        let inv = multi_image_invocation(&dir);
        let runner = RecordingRunner::new();

        normalize_ownership(&inv, &Settings::default(), &runner).unwrap();

        let fixes = runner.ownership_fixes();
        assert_eq!(fixes.len(), 2);
        let owner = HostOwner::of(dir.path()).unwrap();
        let expected_owner = format!("{}:{}", owner.uid, owner.gid);
        assert_eq!(fixes[0].ownership_image(), Some("ubuntu"));
        assert_eq!(fixes[1].ownership_image(), Some("alpine"));
        assert!(fixes[0].args().contains(&expected_owner));
        assert_eq!(fixes[0].args().last().map(String::as_str), Some("/data"));
    }

    #[test]
    fn test_failure_still_attempts_every_image() {
        let dir = TempDir::new().unwrap();
        let inv = multi_image_invocation(&dir);
        let runner = RecordingRunner::new();
        runner.respond_to(" ubuntu -R ", MockResponse::failure(1));

        let err = normalize_ownership(&inv, &Settings::default(), &runner).unwrap_err();

        assert_eq!(runner.ownership_fixes().len(), 2);
        match err.as_invocation() {
            Some(InvocationError::Cleanup { image, .. }) => assert_eq!(image, "ubuntu"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_dropped_guard_runs_fix() {
        let dir = TempDir::new().unwrap();
        let inv = multi_image_invocation(&dir);
        let settings = Settings::default();
        let runner = RecordingRunner::new();

        {
            let _guard = OwnershipGuard::arm(&inv, &settings, &runner);
        }
        assert_eq!(runner.ownership_fixes().len(), 2);
    }

    #[test]
    fn test_released_guard_runs_fix_once() {
        let dir = TempDir::new().unwrap();
        let inv = multi_image_invocation(&dir);
        let settings = Settings::default();
        let runner = RecordingRunner::new();

        let guard = OwnershipGuard::arm(&inv, &settings, &runner);
        guard.release().unwrap();
        assert_eq!(runner.ownership_fixes().len(), 2);
    }
}
