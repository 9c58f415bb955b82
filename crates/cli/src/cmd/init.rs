//! Implementation of the `kiln init` command.

use anyhow::Result;

use kiln_lib::Session;

use crate::output::{DownloadProgress, print_stat, print_success};

/// Check out submodules and provision the toolchain for this host.
pub fn cmd_init(session: &Session<'_>) -> Result<i32> {
  let mut progress = DownloadProgress::new();
  let code = session.init(&mut |done, total| progress.update(done, total))?;
  progress.finish();

  print_success("Project initialized");
  print_stat("Strategy", session.strategy().name());
  Ok(code)
}
