use anyhow::Result;

use kiln_lib::{Profile, Session};

use crate::output::{DownloadProgress, print_success};

pub fn cmd_configure(session: &Session<'_>, profile: Profile) -> Result<i32> {
  let mut progress = DownloadProgress::new();
  let code = session.configure(profile, &mut |done, total| progress.update(done, total))?;
  progress.finish();

  print_success(&format!(
    "Configured {} build in {}",
    profile,
    session.config().build_path().display()
  ));
  Ok(code)
}
