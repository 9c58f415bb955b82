//! Compiler toolchain provisioning.
//!
//! Makes sure the tools a build needs are present before anything is
//! configured:
//! - executables on the search path ([`require_tools`])
//! - the Docker build image ([`docker`])
//! - a downloaded compiler archive ([`archive`], [`fetch`], [`extract`])
//! - the MSVC developer environment on Windows ([`msvc`], [`env`])

pub mod archive;
pub mod docker;
pub mod env;
pub mod extract;
pub mod fetch;
pub mod msvc;

use std::ffi::OsStr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::process::{Executor, ProcessError};
use env::EnvParseError;
use extract::ExtractError;

/// Errors that can occur while provisioning a toolchain.
#[derive(Debug, Error)]
pub enum ToolchainError {
  /// A required executable is not on the search path.
  #[error("required tool '{0}' not found on PATH")]
  MissingTool(String),

  /// HTTP request failed or returned a non-success status.
  #[error("download failed for {url}: {message}")]
  Download { url: String, message: String },

  /// SHA256 hash mismatch after download.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// The archive could not be unpacked.
  #[error("extraction failed: {0}")]
  Extract(#[from] ExtractError),

  /// The toolchain was unpacked but the compiler is not where it should be.
  #[error("compiler not found at {}", .0.display())]
  CompilerMissing(PathBuf),

  /// No Visual Studio installation with a vcvars script was found.
  #[error("no Visual Studio installation found (searched {searched} locations)")]
  MsvcNotFound { searched: usize },

  /// The developer-environment script output was unusable.
  #[error("invalid MSVC environment: {0}")]
  Environment(#[from] EnvParseError),

  /// An external provisioning command failed.
  #[error(transparent)]
  Process(#[from] ProcessError),

  /// I/O error during provisioning.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Check that every tool in `tools` can be found.
///
/// `search_path` overrides the process `PATH` (e.g. the `PATH` captured from
/// a developer-environment script). The first missing tool is reported.
pub fn require_tools(executor: &dyn Executor, tools: &[&str], search_path: Option<&OsStr>) -> Result<(), ToolchainError> {
  for tool in tools {
    match executor.which(tool, search_path) {
      Some(path) => debug!(tool, path = %path.display(), "found tool"),
      None => return Err(ToolchainError::MissingTool((*tool).to_string())),
    }
  }
  Ok(())
}
