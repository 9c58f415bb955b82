use anyhow::Result;

use kiln_lib::Session;
use kiln_lib::clean::CleanOutcome;

use crate::output::{print_info, print_success};

pub fn cmd_clean(session: &Session<'_>) -> Result<i32> {
  let build_path = session.config().build_path();
  match session.clean()? {
    CleanOutcome::Removed => print_success(&format!("Removed {}", build_path.display())),
    CleanOutcome::NothingToClean => print_info(&format!("Nothing to clean: {} does not exist", build_path.display())),
  }
  Ok(0)
}
