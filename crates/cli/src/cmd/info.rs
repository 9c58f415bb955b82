use anyhow::Result;

use kiln_lib::Session;

use crate::output::{print_info, print_json, print_stat};

pub fn cmd_info(session: &Session<'_>, json: bool) -> Result<i32> {
  let info = session.info();

  if json {
    print_json(&info)?;
    return Ok(0);
  }

  print_info("System:");
  print_stat("Platform", &info.platform);
  print_stat("Strategy", &info.strategy);
  println!();
  print_info("Project:");
  print_stat("Root", &info.project_root.display().to_string());
  print_stat("Build dir", &info.build_dir.display().to_string());
  print_stat("Binary", &info.binary_name);
  print_stat("Toolchain cache", &info.toolchain_cache.display().to_string());
  Ok(0)
}
