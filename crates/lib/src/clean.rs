//! Build directory removal.
//!
//! Containers write build output as root, so a plain removal can fail with
//! `PermissionDenied` on Linux. There the removal is retried once through
//! `sudo rm -rf`; on Windows it is reported.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::error::Error;
use crate::platform::os::HostOs;
use crate::process::{CommandSpec, Executor, run_checked};

#[derive(Debug, Error)]
pub enum CleanError {
  #[error("cannot remove {}: permission denied", path.display())]
  PermissionDenied { path: PathBuf },

  #[error("failed to remove {}: {source}", path.display())]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// What [`clean`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
  Removed,
  /// The directory did not exist.
  NothingToClean,
}

/// `sudo rm -rf <dir>`
pub fn sudo_remove_command(dir: &Path) -> CommandSpec {
  CommandSpec::new("sudo").args(["rm", "-rf"]).path_arg(dir)
}

/// Remove `dir` and everything below it. A missing directory is not an error.
pub fn clean(executor: &dyn Executor, dir: &Path, os: HostOs) -> Result<CleanOutcome, Error> {
  clean_with(executor, dir, os, |d| fs::remove_dir_all(d))
}

fn clean_with(
  executor: &dyn Executor,
  dir: &Path,
  os: HostOs,
  remove: impl Fn(&Path) -> io::Result<()>,
) -> Result<CleanOutcome, Error> {
  if fs::symlink_metadata(dir).is_err() {
    info!(path = %dir.display(), "build directory does not exist, nothing to clean");
    return Ok(CleanOutcome::NothingToClean);
  }

  match remove(dir) {
    Ok(()) => {
      info!(path = %dir.display(), "removed build directory");
      Ok(CleanOutcome::Removed)
    }
    Err(e) if e.kind() == ErrorKind::PermissionDenied => {
      if !os.supports_sudo() {
        return Err(CleanError::PermissionDenied { path: dir.to_path_buf() }.into());
      }
      warn!(path = %dir.display(), "permission denied, retrying with sudo");
      run_checked(executor, &sudo_remove_command(dir))?;
      Ok(CleanOutcome::Removed)
    }
    Err(source) => Err(
      CleanError::Remove {
        path: dir.to_path_buf(),
        source,
      }
      .into(),
    ),
  }
}
