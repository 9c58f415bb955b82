use anyhow::Result;

use kiln_lib::Session;

/// Launch the built binary. Its exit code is passed through unchanged.
pub fn cmd_run(session: &Session<'_>, args: &[String]) -> Result<i32> {
  Ok(session.run(args)?)
}
