//! Configure and build the CMake project.
//!
//! Both steps share the same preparation: host tools are checked, the
//! strategy provisions its toolchain, and the tools the toolchain must supply
//! are looked up in the environment it returned. The build step only
//! reconfigures when the CMake cache is missing or was written for another
//! build type.

use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::clean::CleanError;
use crate::config::Config;
use crate::error::Error;
use crate::process::{Executor, run_checked};
use crate::strategy::Strategy;
use crate::toolchain::env::EnvSnapshot;
use crate::toolchain::fetch::Progress;
use crate::toolchain::require_tools;

/// CMake build type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
  Debug,
  #[default]
  Release,
}

impl Profile {
  pub fn from_debug(debug: bool) -> Self {
    if debug { Profile::Debug } else { Profile::Release }
  }

  /// Value of `CMAKE_BUILD_TYPE` (and of `--config` for multi-config
  /// generators).
  pub fn build_type(&self) -> &'static str {
    match self {
      Profile::Debug => "Debug",
      Profile::Release => "Release",
    }
  }
}

impl fmt::Display for Profile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.build_type())
  }
}

/// What `kiln build` was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildOptions {
  pub profile: Profile,
  /// Launch the binary after a successful build.
  pub run_after_build: bool,
  /// Remove the build directory before configuring.
  pub clean_first: bool,
}

/// `CMAKE_BUILD_TYPE` recorded in a CMake cache file, if any.
pub fn cached_build_type(cache_file: &Path) -> Option<String> {
  let content = fs::read_to_string(cache_file).ok()?;
  content.lines().find_map(|line| {
    let (key, value) = line.split_once('=')?;
    let name = key.split(':').next()?;
    (name.trim() == "CMAKE_BUILD_TYPE").then(|| value.trim().to_string())
  })
}

/// Whether the project has to be (re)configured before building `profile`.
pub fn needs_configure(cache_file: &Path, profile: Profile) -> bool {
  match cached_build_type(cache_file) {
    None => true,
    Some(cached) => !cached.eq_ignore_ascii_case(profile.build_type()),
  }
}

/// Check tools and provision the toolchain, returning the environment every
/// configure and build command runs with.
pub fn prepare(executor: &dyn Executor, strategy: &dyn Strategy, progress: Progress<'_>) -> Result<EnvSnapshot, Error> {
  require_tools(executor, &strategy.host_tools(), None)?;
  let env = strategy.provision(executor, progress)?;
  require_tools(executor, &strategy.toolchain_tools(), env.search_path())?;
  Ok(env)
}

/// Provision and run a fresh CMake configure for `profile`.
pub fn configure(
  executor: &dyn Executor,
  strategy: &dyn Strategy,
  config: &Config,
  profile: Profile,
  progress: Progress<'_>,
) -> Result<(), Error> {
  let env = prepare(executor, strategy, progress)?;
  configure_with(executor, strategy, config, profile, &env)
}

fn configure_with(
  executor: &dyn Executor,
  strategy: &dyn Strategy,
  config: &Config,
  profile: Profile,
  env: &EnvSnapshot,
) -> Result<(), Error> {
  remove_stale_cache(&config.cache_file())?;

  let build_path = config.build_path();
  fs::create_dir_all(&build_path)?;

  info!(profile = %profile, build_dir = %build_path.display(), "configuring");
  run_checked(executor, &strategy.configure_command(profile).envs(env))?;
  Ok(())
}

fn remove_stale_cache(cache_file: &Path) -> Result<(), Error> {
  remove_stale_cache_with(cache_file, |f| fs::remove_file(f))
}

/// A cache that cannot be deleted (typically root-owned after a container
/// build) stops the configure; `kiln clean` can remove it with sudo.
fn remove_stale_cache_with(cache_file: &Path, remove: impl Fn(&Path) -> io::Result<()>) -> Result<(), Error> {
  match remove(cache_file) {
    Ok(()) => {
      debug!(path = %cache_file.display(), "removed stale CMake cache");
      Ok(())
    }
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
    Err(e) if e.kind() == ErrorKind::PermissionDenied => {
      warn!(path = %cache_file.display(), "cannot remove stale CMake cache, run `kiln clean` first");
      Err(
        CleanError::PermissionDenied {
          path: cache_file.to_path_buf(),
        }
        .into(),
      )
    }
    Err(e) => Err(e.into()),
  }
}

/// Build the project for `profile`, configuring first when needed.
pub fn build(
  executor: &dyn Executor,
  strategy: &dyn Strategy,
  config: &Config,
  profile: Profile,
  progress: Progress<'_>,
) -> Result<(), Error> {
  let env = prepare(executor, strategy, progress)?;

  let cache_file = config.cache_file();
  if needs_configure(&cache_file, profile) {
    info!(path = %cache_file.display(), "CMake cache missing or for another build type");
    configure_with(executor, strategy, config, profile, &env)?;
  }

  let jobs = strategy.core_count(executor);
  info!(profile = %profile, jobs, "building");
  run_checked(executor, &strategy.build_command(profile, jobs).envs(&env))?;
  Ok(())
}
