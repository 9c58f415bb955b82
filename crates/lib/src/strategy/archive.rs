use std::path::PathBuf;

use super::{Strategy, cmake_configure_args, host_core_count, slash_path};
use crate::config::{ArchiveConfig, Config, ConfigError};
use crate::error::Error;
use crate::platform::arch::Arch;
use crate::platform::os::HostOs;
use crate::platform::paths::downloads_dir;
use crate::process::{CommandSpec, Executor};
use crate::project::Profile;
use crate::toolchain::ToolchainError;
use crate::toolchain::archive::{ToolchainLocation, ensure_toolchain};
use crate::toolchain::env::EnvSnapshot;
use crate::toolchain::fetch::Progress;

/// Native Linux builds with a downloaded compiler archive, passed to CMake
/// explicitly so the host compiler is never picked up.
#[derive(Debug, Clone)]
pub struct ArchiveStrategy {
  toolchain: ArchiveConfig,
  location: ToolchainLocation,
  toolchains_dir: PathBuf,
  arch: Arch,
  source_path: PathBuf,
  build_path: PathBuf,
  binary_name: String,
}

impl ArchiveStrategy {
  pub fn new(config: &Config, arch: Arch) -> Result<Self, Error> {
    let toolchain = config.toolchain.clone().ok_or(ConfigError::MissingToolchain)?;
    Ok(Self {
      location: ToolchainLocation::new(&toolchain, &config.toolchains_dir),
      toolchain,
      toolchains_dir: config.toolchains_dir.clone(),
      arch,
      source_path: config.source_path(),
      build_path: config.build_path(),
      binary_name: config.binary_name.clone(),
    })
  }

  fn uses_ninja(&self) -> bool {
    self.toolchain.generator.eq_ignore_ascii_case("ninja")
  }
}

impl Strategy for ArchiveStrategy {
  fn name(&self) -> &'static str {
    "archive"
  }

  fn host(&self) -> HostOs {
    HostOs::Linux
  }

  fn host_tools(&self) -> Vec<&'static str> {
    if self.uses_ninja() {
      vec!["cmake", "ninja"]
    } else {
      vec!["cmake", "make"]
    }
  }

  fn provision(&self, _executor: &dyn Executor, progress: Progress<'_>) -> Result<EnvSnapshot, ToolchainError> {
    ensure_toolchain(&self.toolchain, &self.toolchains_dir, &downloads_dir(), self.arch, progress)?;
    Ok(EnvSnapshot::empty())
  }

  fn configure_command(&self, profile: Profile) -> CommandSpec {
    CommandSpec::new("cmake")
      .args(cmake_configure_args(
        &slash_path(&self.source_path),
        &slash_path(&self.build_path),
        &self.toolchain.generator,
        profile,
        &self.binary_name,
      ))
      .arg(format!("-DCMAKE_C_COMPILER={}", slash_path(&self.location.c_compiler)))
      .arg(format!("-DCMAKE_CXX_COMPILER={}", slash_path(&self.location.cxx_compiler)))
  }

  fn build_command(&self, _profile: Profile, jobs: usize) -> CommandSpec {
    let tool = if self.uses_ninja() { "ninja" } else { "make" };
    CommandSpec::new(tool)
      .arg("-C")
      .arg(slash_path(&self.build_path))
      .arg(format!("-j{jobs}"))
  }

  fn core_count(&self, _executor: &dyn Executor) -> usize {
    host_core_count()
  }

  fn binary_candidates(&self) -> Vec<PathBuf> {
    vec![self.build_path.join(&self.binary_name)]
  }
}
