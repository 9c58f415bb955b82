//! Test utilities for kiln-lib.
//!
//! [`RecordingExecutor`] stands in for [`SystemExecutor`](crate::process::SystemExecutor):
//! it records every command instead of spawning it and answers with scripted
//! exit codes and output.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::PathBuf;

use crate::process::{Captured, CommandSpec, Executor, ProcessError};

struct Response {
  pattern: String,
  code: i32,
  stdout: String,
}

#[derive(Default)]
pub struct RecordingExecutor {
  tools: BTreeSet<String>,
  responses: Vec<Response>,
  commands: RefCell<Vec<CommandSpec>>,
}

impl RecordingExecutor {
  /// Every command succeeds with empty output; no tools are installed.
  pub fn new() -> Self {
    Self::default()
  }

  /// Like [`new`](Self::new) with `tools` resolvable by `which`.
  pub fn with_tools(tools: &[&str]) -> Self {
    let mut executor = Self::new();
    executor.tools = tools.iter().map(|t| (*t).to_string()).collect();
    executor
  }

  /// Answer commands whose rendered line contains `pattern` with `code` and
  /// `stdout`. The first matching response wins.
  pub fn respond(mut self, pattern: &str, code: i32, stdout: &str) -> Self {
    self.responses.push(Response {
      pattern: pattern.to_string(),
      code,
      stdout: stdout.to_string(),
    });
    self
  }

  /// All commands seen so far, in order.
  pub fn commands(&self) -> Vec<CommandSpec> {
    self.commands.borrow().clone()
  }

  /// Rendered command lines seen so far, in order.
  pub fn lines(&self) -> Vec<String> {
    self.commands.borrow().iter().map(ToString::to_string).collect()
  }

  fn answer(&self, cmd: &CommandSpec) -> (i32, String) {
    self.commands.borrow_mut().push(cmd.clone());
    let line = cmd.to_string();
    self
      .responses
      .iter()
      .find(|r| line.contains(&r.pattern))
      .map(|r| (r.code, r.stdout.clone()))
      .unwrap_or((0, String::new()))
  }
}

impl Executor for RecordingExecutor {
  fn run(&self, cmd: &CommandSpec) -> Result<i32, ProcessError> {
    Ok(self.answer(cmd).0)
  }

  fn capture(&self, cmd: &CommandSpec) -> Result<Captured, ProcessError> {
    let (code, stdout) = self.answer(cmd);
    Ok(Captured { code, stdout })
  }

  fn which(&self, tool: &str, _search_path: Option<&OsStr>) -> Option<PathBuf> {
    self
      .tools
      .contains(tool)
      .then(|| PathBuf::from("/usr/bin").join(tool))
  }
}
