//! MSVC developer-environment discovery.
//!
//! Visual Studio does not put its compiler on `PATH`; `vcvars64.bat` does.
//! We locate that script across the known installation layouts, run it, and
//! capture the environment it leaves behind as an [`EnvSnapshot`].

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::process::{CommandSpec, Executor, capture_checked};
use crate::toolchain::ToolchainError;
use crate::toolchain::env::{EnvSnapshot, REQUIRED_MSVC_VARS};

/// Visual Studio releases, newest first.
pub const VS_VERSIONS: [&str; 3] = ["2022", "2019", "2017"];

/// Editions, in preference order.
pub const VS_EDITIONS: [&str; 4] = ["Community", "BuildTools", "Professional", "Enterprise"];

/// Installation roots to search: `%ProgramFiles%` then `%ProgramFiles(x86)%`.
pub fn default_roots() -> Vec<PathBuf> {
  let mut roots = Vec::new();
  for (var, fallback) in [
    ("ProgramFiles", r"C:\Program Files"),
    ("ProgramFiles(x86)", r"C:\Program Files (x86)"),
  ] {
    let root = std::env::var_os(var)
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(fallback));
    if !roots.contains(&root) {
      roots.push(root);
    }
  }
  roots
}

/// Every place a `vcvars64.bat` may live, in search order.
pub fn vcvars_candidates(roots: &[PathBuf]) -> Vec<PathBuf> {
  let mut candidates = Vec::new();
  for root in roots {
    for version in VS_VERSIONS {
      for edition in VS_EDITIONS {
        candidates.push(
          root
            .join("Microsoft Visual Studio")
            .join(version)
            .join(edition)
            .join("VC")
            .join("Auxiliary")
            .join("Build")
            .join("vcvars64.bat"),
        );
      }
    }
  }
  candidates
}

/// First candidate for which `exists` holds.
pub fn find_vcvars(roots: &[PathBuf], exists: impl Fn(&Path) -> bool) -> Result<PathBuf, ToolchainError> {
  let candidates = vcvars_candidates(roots);
  let searched = candidates.len();
  candidates
    .into_iter()
    .find(|c| {
      let found = exists(c);
      debug!(path = %c.display(), found, "probing vcvars");
      found
    })
    .ok_or(ToolchainError::MsvcNotFound { searched })
}

/// `cmd.exe /C call "<vcvars>" >nul && set`
pub fn environment_command(vcvars: &Path) -> CommandSpec {
  CommandSpec::new("cmd.exe")
    .args(["/C".to_string(), format!("call \"{}\" >nul && set", vcvars.display())])
    .verbatim()
}

/// Run `vcvars` and capture the resulting environment.
pub fn capture_environment(executor: &dyn Executor, vcvars: &Path) -> Result<EnvSnapshot, ToolchainError> {
  info!(script = %vcvars.display(), "loading MSVC environment");
  let output = capture_checked(executor, &environment_command(vcvars))?;
  let snapshot = EnvSnapshot::parse_requiring(&output, &REQUIRED_MSVC_VARS)?;
  debug!(vars = snapshot.len(), "captured MSVC environment");
  Ok(snapshot)
}

/// Locate Visual Studio under `roots` and capture its developer environment.
pub fn discover(executor: &dyn Executor, roots: &[PathBuf]) -> Result<EnvSnapshot, ToolchainError> {
  let vcvars = find_vcvars(roots, Path::is_file)?;
  capture_environment(executor, &vcvars)
}
