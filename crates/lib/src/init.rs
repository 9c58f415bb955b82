//! Fetch sources and provision the toolchain ahead of the first build.

use tracing::info;

use crate::config::Config;
use crate::error::Error;
use crate::process::{CommandSpec, Executor, run_checked};
use crate::project::prepare;
use crate::strategy::Strategy;
use crate::toolchain::fetch::Progress;
use crate::toolchain::require_tools;

/// `git submodule update --init --recursive`, run in the project root.
pub fn submodule_command(config: &Config) -> CommandSpec {
  CommandSpec::new("git")
    .args(["submodule", "update", "--init", "--recursive"])
    .current_dir(&config.project_root)
}

/// Check out every submodule, then provision the toolchain and check that the
/// build tools are reachable.
pub fn init(
  executor: &dyn Executor,
  strategy: &dyn Strategy,
  config: &Config,
  progress: Progress<'_>,
) -> Result<(), Error> {
  require_tools(executor, &["git"], None)?;

  info!(root = %config.project_root.display(), "updating submodules");
  run_checked(executor, &submodule_command(config))?;

  prepare(executor, strategy, progress)?;
  info!(strategy = strategy.name(), "toolchain ready");
  Ok(())
}
