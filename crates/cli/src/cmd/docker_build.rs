use anyhow::Result;

use kiln_lib::Session;

use crate::output::print_success;

pub fn cmd_docker_build(session: &Session<'_>) -> Result<i32> {
  let code = session.docker_build()?;
  print_success(&format!("Built docker image {}", session.config().docker.image));
  Ok(code)
}
