//! Docker build image management.

use std::path::Path;

use tracing::info;

use crate::config::DockerConfig;
use crate::process::{CommandSpec, Executor, run_checked};
use crate::toolchain::ToolchainError;

/// `docker image inspect <image>`
pub fn inspect_command(image: &str) -> CommandSpec {
  CommandSpec::new("docker").args(["image", "inspect", image])
}

/// `docker build -t <image> -f <dockerfile> <root>`
pub fn build_command(docker: &DockerConfig, project_root: &Path) -> CommandSpec {
  CommandSpec::new("docker")
    .args(["build", "-t", docker.image.as_str(), "-f"])
    .path_arg(&project_root.join(&docker.dockerfile))
    .path_arg(project_root)
}

/// Whether the image already exists locally. Output is discarded.
pub fn image_exists(executor: &dyn Executor, image: &str) -> Result<bool, ToolchainError> {
  Ok(executor.capture(&inspect_command(image))?.success())
}

/// Build the image from its Dockerfile unconditionally.
pub fn build_image(executor: &dyn Executor, docker: &DockerConfig, project_root: &Path) -> Result<(), ToolchainError> {
  info!(image = %docker.image, "building docker image");
  run_checked(executor, &build_command(docker, project_root))?;
  Ok(())
}

/// Build the image only when `docker image inspect` does not find it.
pub fn ensure_image(executor: &dyn Executor, docker: &DockerConfig, project_root: &Path) -> Result<(), ToolchainError> {
  if image_exists(executor, &docker.image)? {
    info!(image = %docker.image, "docker image present");
    return Ok(());
  }
  build_image(executor, docker, project_root)
}
