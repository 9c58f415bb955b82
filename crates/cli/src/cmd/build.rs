//! Implementation of the `kiln build` command.

use std::time::Instant;

use anyhow::Result;

use kiln_lib::{BuildOptions, Session};

use crate::output::{DownloadProgress, format_duration, print_success};

/// Build the project and report how long it took.
///
/// With `--run` the binary is launched once the build succeeded and its exit
/// code becomes ours. The launch is kept out of the reported build time.
pub fn cmd_build(session: &Session<'_>, options: BuildOptions) -> Result<i32> {
  let started = Instant::now();
  let mut progress = DownloadProgress::new();
  session.build(
    BuildOptions {
      run_after_build: false,
      ..options
    },
    &mut |done, total| progress.update(done, total),
  )?;
  progress.finish();

  print_success(&format!(
    "{} build finished in {}",
    options.profile,
    format_duration(started.elapsed())
  ));

  if options.run_after_build {
    return Ok(session.run(&[])?);
  }
  Ok(0)
}
