//! Crate-level error type.

use thiserror::Error;

use crate::clean::CleanError;
use crate::config::ConfigError;
use crate::launch::LaunchError;
use crate::process::ProcessError;
use crate::toolchain::ToolchainError;

/// Any failure a kiln command can end with.
#[derive(Debug, Error)]
pub enum Error {
  /// The host operating system (or architecture) has no build strategy.
  #[error("unsupported platform: {0}")]
  UnsupportedPlatform(String),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Toolchain(#[from] ToolchainError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Clean(#[from] CleanError),

  #[error(transparent)]
  Launch(#[from] LaunchError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// Process exit code for this error.
  ///
  /// A failed external command hands its own exit code through; everything
  /// else exits with `1`.
  pub fn exit_code(&self) -> i32 {
    match self {
      Error::Process(ProcessError::Failed { code, .. })
      | Error::Toolchain(ToolchainError::Process(ProcessError::Failed { code, .. })) => {
        if *code == 0 { 1 } else { *code }
      }
      _ => 1,
    }
  }
}
