//! One kiln invocation.
//!
//! A [`Session`] pairs the immutable [`Config`] with the strategy selected for
//! the host and the [`Executor`] that runs external commands. It is the only
//! entry point the CLI handlers use; the methods that run something return the
//! process exit code on success.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::clean::{CleanOutcome, clean};
use crate::config::Config;
use crate::error::Error;
use crate::init::init;
use crate::launch::{launch, locate_binary};
use crate::platform::Platform;
use crate::platform::arch::Arch;
use crate::platform::os::HostOs;
use crate::process::Executor;
use crate::project::{self, BuildOptions, Profile};
use crate::strategy::{self, Strategy};
use crate::toolchain::docker::build_image;
use crate::toolchain::fetch::Progress;
use crate::toolchain::require_tools;

/// Resolve the host OS from the config override or the running system.
pub fn resolve_host(config: &Config) -> Result<HostOs, Error> {
  match &config.host_os {
    Some(id) => HostOs::from_identifier(id).ok_or_else(|| Error::UnsupportedPlatform(id.clone())),
    None => HostOs::current().ok_or_else(|| Error::UnsupportedPlatform(std::env::consts::OS.to_string())),
  }
}

/// What `kiln info` reports.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
  pub platform: String,
  pub strategy: String,
  pub project_root: PathBuf,
  pub build_dir: PathBuf,
  pub binary_name: String,
  pub toolchain_cache: PathBuf,
}

pub struct Session<'a> {
  config: Config,
  os: HostOs,
  strategy: Box<dyn Strategy>,
  executor: &'a dyn Executor,
}

impl<'a> Session<'a> {
  /// Select the strategy for the host once. Fails for hosts kiln cannot
  /// build on, before any external command runs.
  pub fn new(config: Config, executor: &'a dyn Executor) -> Result<Self, Error> {
    let os = resolve_host(&config)?;
    let strategy = strategy::select(&config, os)?;
    debug!(os = %os, strategy = strategy.name(), "selected build strategy");
    Ok(Self {
      config,
      os,
      strategy,
      executor,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn os(&self) -> HostOs {
    self.os
  }

  pub fn strategy(&self) -> &dyn Strategy {
    self.strategy.as_ref()
  }

  /// Check out submodules and provision the toolchain.
  pub fn init(&self, progress: Progress<'_>) -> Result<i32, Error> {
    init(self.executor, self.strategy(), &self.config, progress)?;
    Ok(0)
  }

  /// Configure from scratch for `profile`.
  pub fn configure(&self, profile: Profile, progress: Progress<'_>) -> Result<i32, Error> {
    project::configure(self.executor, self.strategy(), &self.config, profile, progress)?;
    Ok(0)
  }

  /// Build, optionally cleaning first and launching the binary afterwards.
  /// With `run_after_build`, the binary's exit code is returned.
  pub fn build(&self, options: BuildOptions, progress: Progress<'_>) -> Result<i32, Error> {
    if options.clean_first {
      self.clean()?;
    }
    project::build(self.executor, self.strategy(), &self.config, options.profile, progress)?;
    if options.run_after_build {
      return self.run(&[]);
    }
    Ok(0)
  }

  pub fn clean(&self) -> Result<CleanOutcome, Error> {
    clean(self.executor, &self.config.build_path(), self.os)
  }

  /// Launch the built binary with `args`; its exit code is returned as-is.
  pub fn run(&self, args: &[String]) -> Result<i32, Error> {
    let binary = locate_binary(&self.strategy.binary_candidates())?;
    info!(binary = %binary.display(), "launching");
    launch(self.executor, &binary, args, &self.config.project_root)
  }

  /// Rebuild the Docker image from its Dockerfile.
  pub fn docker_build(&self) -> Result<i32, Error> {
    require_tools(self.executor, &["docker"], None)?;
    build_image(self.executor, &self.config.docker, &self.config.project_root)?;
    Ok(0)
  }

  pub fn info(&self) -> SessionInfo {
    let platform = match Arch::current() {
      Some(arch) => Platform::new(arch, self.os).triple(),
      None => format!("{}-{}", std::env::consts::ARCH, self.os),
    };
    SessionInfo {
      platform,
      strategy: self.strategy.name().to_string(),
      project_root: self.config.project_root.clone(),
      build_dir: self.config.build_path(),
      binary_name: self.config.binary_name.clone(),
      toolchain_cache: self.config.toolchains_dir.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use crate::launch::LaunchError;
  use crate::util::testutil::RecordingExecutor;
  use tempfile::TempDir;

  fn config_for(root: &std::path::Path, host: &str) -> Config {
    let mut config = Config::defaults(root);
    config.host_os = Some(host.to_string());
    config
  }

  #[test]
  fn unsupported_host_fails_before_running_anything() {
    let temp = TempDir::new().unwrap();
    let executor = RecordingExecutor::with_tools(&["docker", "git"]);

    for host in ["solaris", "macos", "freebsd"] {
      let err = Session::new(config_for(temp.path(), host), &executor).err().unwrap();
      assert!(matches!(err, Error::UnsupportedPlatform(ref id) if id == host));
      assert_eq!(err.exit_code(), 1);
    }
    assert!(executor.commands().is_empty());
  }

  #[test]
  fn host_override_selects_strategy() {
    let executor = RecordingExecutor::new();
    let linux = Session::new(config_for(std::path::Path::new("/p"), "linux"), &executor).unwrap();
    assert_eq!(linux.strategy().name(), "docker");

    let windows = Session::new(config_for(std::path::Path::new("/p"), "Windows"), &executor).unwrap();
    assert_eq!(windows.os(), HostOs::Windows);
    assert_eq!(windows.strategy().name(), "msvc");
  }

  #[test]
  fn clean_without_build_dir_succeeds_on_every_host() {
    let temp = TempDir::new().unwrap();
    let executor = RecordingExecutor::new();
    for host in ["linux", "windows"] {
      let session = Session::new(config_for(temp.path(), host), &executor).unwrap();
      assert_eq!(session.clean().unwrap(), CleanOutcome::NothingToClean);
    }
    assert!(executor.commands().is_empty());
  }

  #[test]
  fn clean_reports_removed_build_dir() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("build/CMakeFiles")).unwrap();
    let executor = RecordingExecutor::new();
    let session = Session::new(config_for(temp.path(), "linux"), &executor).unwrap();

    assert_eq!(session.clean().unwrap(), CleanOutcome::Removed);
    assert!(!temp.path().join("build").exists());
  }

  #[test]
  fn run_without_binary_executes_nothing() {
    let temp = TempDir::new().unwrap();
    let executor = RecordingExecutor::new();
    let session = Session::new(config_for(temp.path(), "linux"), &executor).unwrap();

    let err = session.run(&[]).unwrap_err();

    assert!(matches!(err, Error::Launch(LaunchError::BinaryNotFound { .. })));
    assert!(executor.commands().is_empty());
  }

  #[test]
  fn run_returns_binary_exit_code() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("build")).unwrap();
    fs::write(temp.path().join("build/app"), "").unwrap();
    let executor = RecordingExecutor::new().respond("build/app", 3, "");
    let session = Session::new(config_for(temp.path(), "linux"), &executor).unwrap();

    assert_eq!(session.run(&[]).unwrap(), 3);
  }

  #[test]
  fn clean_build_and_run() {
    let temp = TempDir::new().unwrap();
    let build = temp.path().join("build");
    fs::create_dir_all(&build).unwrap();
    fs::write(build.join("stale.o"), "").unwrap();
    let executor = RecordingExecutor::with_tools(&["docker"]).respond("nproc", 0, "4\n");
    let session = Session::new(config_for(temp.path(), "linux"), &executor).unwrap();

    let options = BuildOptions {
      profile: Profile::Debug,
      run_after_build: true,
      clean_first: true,
    };
    let err = session.build(options, &mut |_, _| {}).unwrap_err();

    // The recorded build produced no binary, so the launch step reports it.
    assert!(matches!(err, Error::Launch(_)));
    assert!(!build.join("stale.o").exists());
    assert!(executor.lines().iter().any(|l| l.ends_with("make -C build -j4")));
  }

  #[test]
  fn docker_build_requires_docker() {
    let executor = RecordingExecutor::new();
    let session = Session::new(config_for(std::path::Path::new("/p"), "linux"), &executor).unwrap();

    assert!(session.docker_build().is_err());
    assert!(executor.commands().is_empty());
  }

  #[test]
  fn docker_build_always_builds() {
    let executor = RecordingExecutor::with_tools(&["docker"]);
    let session = Session::new(config_for(std::path::Path::new("/p"), "linux"), &executor).unwrap();

    assert_eq!(session.docker_build().unwrap(), 0);
    let lines = executor.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("docker build -t gcc10-builder -f"));
  }

  #[test]
  fn info_reports_strategy_and_paths() {
    let executor = RecordingExecutor::new();
    let session = Session::new(config_for(std::path::Path::new("/p"), "windows"), &executor).unwrap();

    let info = session.info();
    assert_eq!(info.strategy, "msvc");
    assert!(info.platform.ends_with("-windows"));
    assert_eq!(info.build_dir, PathBuf::from("/p/build"));
  }
}
