use std::path::PathBuf;

use tracing::debug;

use super::{Strategy, cmake_configure_args, slash_path};
use crate::config::{Config, DockerConfig};
use crate::consts::DEFAULT_JOBS;
use crate::platform::os::HostOs;
use crate::process::{CommandSpec, Executor};
use crate::project::Profile;
use crate::toolchain::ToolchainError;
use crate::toolchain::docker::ensure_image;
use crate::toolchain::env::EnvSnapshot;
use crate::toolchain::fetch::Progress;

/// Linux builds inside a container image with a pinned compiler. The project
/// root is bind-mounted at the container workspace.
#[derive(Debug, Clone)]
pub struct DockerStrategy {
  docker: DockerConfig,
  project_root: PathBuf,
  source_dir: String,
  build_dir: String,
  build_path: PathBuf,
  binary_name: String,
}

impl DockerStrategy {
  pub fn new(config: &Config) -> Self {
    Self {
      docker: config.docker.clone(),
      project_root: config.project_root.clone(),
      source_dir: slash_path(&config.source_dir),
      build_dir: slash_path(&config.build_dir),
      build_path: config.build_path(),
      binary_name: config.binary_name.clone(),
    }
  }

  /// `docker run --rm -v <root>:<workspace> -w <workspace> <image>`, ready for
  /// the in-container command.
  fn run_in_container(&self) -> CommandSpec {
    CommandSpec::new("docker")
      .args(["run", "--rm", "-v"])
      .arg(format!("{}:{}", self.project_root.display(), self.docker.workspace))
      .args(["-w", self.docker.workspace.as_str(), self.docker.image.as_str()])
  }
}

impl Strategy for DockerStrategy {
  fn name(&self) -> &'static str {
    "docker"
  }

  fn host(&self) -> HostOs {
    HostOs::Linux
  }

  fn host_tools(&self) -> Vec<&'static str> {
    vec!["docker"]
  }

  fn provision(&self, executor: &dyn Executor, _progress: Progress<'_>) -> Result<EnvSnapshot, ToolchainError> {
    ensure_image(executor, &self.docker, &self.project_root)?;
    Ok(EnvSnapshot::empty())
  }

  fn configure_command(&self, profile: Profile) -> CommandSpec {
    self.run_in_container().arg("cmake").args(cmake_configure_args(
      &self.source_dir,
      &self.build_dir,
      "Unix Makefiles",
      profile,
      &self.binary_name,
    ))
  }

  fn build_command(&self, _profile: Profile, jobs: usize) -> CommandSpec {
    self
      .run_in_container()
      .args(["make", "-C", self.build_dir.as_str()])
      .arg(format!("-j{jobs}"))
  }

  /// Asks `nproc` inside the image so container CPU limits are honoured.
  fn core_count(&self, executor: &dyn Executor) -> usize {
    let cmd = CommandSpec::new("docker").args(["run", "--rm", self.docker.image.as_str(), "nproc"]);
    let jobs = match executor.capture(&cmd) {
      Ok(out) if out.success() => parse_core_count(&out.stdout),
      Ok(_) | Err(_) => None,
    };
    debug!(jobs = ?jobs, "container core count");
    jobs.unwrap_or(DEFAULT_JOBS)
  }

  fn binary_candidates(&self) -> Vec<PathBuf> {
    vec![self.build_path.join(&self.binary_name)]
  }
}

fn parse_core_count(output: &str) -> Option<usize> {
  output.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
