//! Locate and launch the built binary.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::process::{CommandSpec, Executor};

#[derive(Debug, Error)]
pub enum LaunchError {
  /// None of the candidate locations holds a binary.
  #[error("built binary not found (looked in {}); run `kiln build` first", format_searched(.searched))]
  BinaryNotFound { searched: Vec<PathBuf> },
}

fn format_searched(searched: &[PathBuf]) -> String {
  searched
    .iter()
    .map(|p| p.display().to_string())
    .collect::<Vec<_>>()
    .join(", ")
}

/// First candidate that exists as a file.
pub fn locate_binary(candidates: &[PathBuf]) -> Result<PathBuf, LaunchError> {
  for candidate in candidates {
    let found = candidate.is_file();
    debug!(path = %candidate.display(), found, "probing binary");
    if found {
      return Ok(candidate.clone());
    }
  }
  Err(LaunchError::BinaryNotFound {
    searched: candidates.to_vec(),
  })
}

/// Run `binary` from `working_dir` with inherited stdio. The binary's exit code
/// is returned as-is, including non-zero ones.
pub fn launch(
  executor: &dyn Executor,
  binary: &Path,
  args: &[String],
  working_dir: &Path,
) -> Result<i32, crate::error::Error> {
  let cmd = CommandSpec::new(binary.to_string_lossy())
    .args(args.iter().cloned())
    .current_dir(working_dir);
  let code = executor.run(&cmd)?;
  info!(binary = %binary.display(), code, "binary exited");
  Ok(code)
}
