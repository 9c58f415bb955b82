//! Per-platform build strategies.
//!
//! The host decides once, at startup, how a build is carried out. Everything
//! that differs between hosts (how the toolchain is provisioned, which
//! commands configure and build, how many jobs to run, where the binary ends
//! up) sits behind [`Strategy`], so handlers never branch on the platform.

mod archive;
mod docker;
mod msvc;

use std::path::{Path, PathBuf};

pub use archive::ArchiveStrategy;
pub use docker::DockerStrategy;
pub use msvc::MsvcStrategy;

use crate::config::{Config, LinuxToolchain};
use crate::consts::DEFAULT_JOBS;
use crate::error::Error;
use crate::platform::arch::Arch;
use crate::platform::os::HostOs;
use crate::process::{CommandSpec, Executor};
use crate::project::Profile;
use crate::toolchain::ToolchainError;
use crate::toolchain::env::EnvSnapshot;
use crate::toolchain::fetch::Progress;

/// How a build is provisioned, configured, compiled and located on one host.
pub trait Strategy {
  /// Short name shown by `kiln info`.
  fn name(&self) -> &'static str;

  fn host(&self) -> HostOs;

  /// Tools that must be on the process `PATH` before provisioning starts.
  fn host_tools(&self) -> Vec<&'static str>;

  /// Tools that must be found in the provisioned environment.
  fn toolchain_tools(&self) -> Vec<&'static str> {
    Vec::new()
  }

  /// Bring the toolchain into place. The returned environment is applied to
  /// every configure and build command; it is empty when nothing needs to be
  /// overlaid.
  fn provision(&self, executor: &dyn Executor, progress: Progress<'_>) -> Result<EnvSnapshot, ToolchainError>;

  fn configure_command(&self, profile: Profile) -> CommandSpec;

  fn build_command(&self, profile: Profile, jobs: usize) -> CommandSpec;

  /// Parallel job count for the build tool.
  fn core_count(&self, executor: &dyn Executor) -> usize;

  /// Where the produced binary may be, in priority order.
  fn binary_candidates(&self) -> Vec<PathBuf>;
}

/// Pick the strategy for `os` once.
pub fn select(config: &Config, os: HostOs) -> Result<Box<dyn Strategy>, Error> {
  match (os, config.linux_toolchain) {
    (HostOs::Linux, LinuxToolchain::Docker) => Ok(Box::new(DockerStrategy::new(config))),
    (HostOs::Linux, LinuxToolchain::Archive) => {
      let arch = Arch::current().ok_or_else(|| Error::UnsupportedPlatform(std::env::consts::ARCH.to_string()))?;
      Ok(Box::new(ArchiveStrategy::new(config, arch)?))
    }
    (HostOs::Windows, _) => Ok(Box::new(MsvcStrategy::new(config))),
  }
}

/// Job count of the machine running kiln, [`DEFAULT_JOBS`] when unknown.
pub fn host_core_count() -> usize {
  std::thread::available_parallelism()
    .map(|p| p.get())
    .unwrap_or(DEFAULT_JOBS)
}

/// Render a path for a command line, always with forward slashes so container
/// and CMake arguments look the same on every host.
pub(crate) fn slash_path(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}

/// Arguments shared by every `cmake` configure invocation.
pub(crate) fn cmake_configure_args(
  source: &str,
  build: &str,
  generator: &str,
  profile: Profile,
  binary_name: &str,
) -> Vec<String> {
  vec![
    "-S".to_string(),
    source.to_string(),
    "-B".to_string(),
    build.to_string(),
    "-G".to_string(),
    generator.to_string(),
    format!("-DCMAKE_BUILD_TYPE={}", profile.build_type()),
    format!("-DOUTPUT_NAME={binary_name}"),
  ]
}
