//! External command execution.
//!
//! Every tool kiln drives (docker, cmake, make, ninja, git, the produced
//! binary) goes through an [`Executor`]. Commands are described by a
//! [`CommandSpec`] so they can be echoed, logged and recorded in tests before
//! anything is spawned.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, info};

use crate::toolchain::env::EnvSnapshot;

/// Errors from spawning or running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// The program could not be started at all.
  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The program ran and exited with a non-zero code.
  #[error("command failed with exit code {code}: {cmd}")]
  Failed { cmd: String, code: i32 },
}

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  program: String,
  args: Vec<String>,
  env: BTreeMap<String, String>,
  cwd: Option<PathBuf>,
  verbatim: bool,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      env: BTreeMap::new(),
      cwd: None,
      verbatim: false,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Add a path argument, rendered lossily.
  pub fn path_arg(self, path: &Path) -> Self {
    self.arg(path.to_string_lossy().into_owned())
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  /// Overlay every variable of a captured environment.
  pub fn envs(mut self, snapshot: &EnvSnapshot) -> Self {
    for (key, value) in snapshot.iter() {
      self.env.insert(key.to_string(), value.to_string());
    }
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  /// Pass arguments to the program untouched (no quoting). Only meaningful on
  /// Windows, where `cmd.exe /C` lines must not be re-escaped.
  pub fn verbatim(mut self) -> Self {
    self.verbatim = true;
    self
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn env_vars(&self) -> &BTreeMap<String, String> {
    &self.env
  }

  pub fn working_dir(&self) -> Option<&Path> {
    self.cwd.as_deref()
  }

  /// Whether `needle` is one of the arguments.
  pub fn has_arg(&self, needle: &str) -> bool {
    self.args.iter().any(|a| a == needle)
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", quote(&self.program))?;
    for arg in &self.args {
      if self.verbatim {
        write!(f, " {arg}")?;
      } else {
        write!(f, " {}", quote(arg))?;
      }
    }
    Ok(())
  }
}

fn quote(s: &str) -> String {
  if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '"') {
    return s.to_string();
  }
  format!("\"{}\"", s.replace('"', "\\\""))
}

/// Output of a captured command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
  pub code: i32,
  pub stdout: String,
}

impl Captured {
  pub fn success(&self) -> bool {
    self.code == 0
  }
}

/// Runs external commands and looks up executables.
pub trait Executor {
  /// Run with inherited stdio and return the exit code.
  fn run(&self, cmd: &CommandSpec) -> Result<i32, ProcessError>;

  /// Run with stdout captured and stderr discarded.
  fn capture(&self, cmd: &CommandSpec) -> Result<Captured, ProcessError>;

  /// Locate `tool` on `search_path`, or on the process `PATH` when `None`.
  fn which(&self, tool: &str, search_path: Option<&OsStr>) -> Option<PathBuf>;
}

/// Run `cmd` and turn a non-zero exit into [`ProcessError::Failed`].
pub fn run_checked(executor: &dyn Executor, cmd: &CommandSpec) -> Result<(), ProcessError> {
  match executor.run(cmd)? {
    0 => Ok(()),
    code => Err(ProcessError::Failed {
      cmd: cmd.to_string(),
      code,
    }),
  }
}

/// Capture `cmd` and turn a non-zero exit into [`ProcessError::Failed`].
pub fn capture_checked(executor: &dyn Executor, cmd: &CommandSpec) -> Result<String, ProcessError> {
  let captured = executor.capture(cmd)?;
  if !captured.success() {
    return Err(ProcessError::Failed {
      cmd: cmd.to_string(),
      code: captured.code,
    });
  }
  Ok(captured.stdout)
}

/// [`Executor`] that spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
  echo: bool,
}

impl SystemExecutor {
  /// Print every command line to stdout before running or capturing it.
  pub fn echoing() -> Self {
    Self { echo: true }
  }

  /// The `→ cmd` line shown for `spec`, if this executor echoes.
  fn echo_line(&self, spec: &CommandSpec) -> Option<String> {
    self.echo.then(|| format!("→ {spec}"))
  }

  fn announce(&self, spec: &CommandSpec) {
    if let Some(line) = self.echo_line(spec) {
      println!("{line}");
    }
  }

  fn command(&self, spec: &CommandSpec) -> Command {
    let mut command = Command::new(&spec.program);

    if spec.verbatim {
      push_verbatim(&mut command, &spec.args);
    } else {
      command.args(&spec.args);
    }

    command.envs(&spec.env);
    if let Some(dir) = &spec.cwd {
      command.current_dir(dir);
    }
    command
  }

  fn spawn_error(spec: &CommandSpec, source: std::io::Error) -> ProcessError {
    ProcessError::Spawn {
      program: spec.program.clone(),
      source,
    }
  }
}

#[cfg(windows)]
fn push_verbatim(command: &mut Command, args: &[String]) {
  use std::os::windows::process::CommandExt;
  for arg in args {
    command.raw_arg(arg);
  }
}

#[cfg(not(windows))]
fn push_verbatim(command: &mut Command, args: &[String]) {
  command.args(args);
}

impl Executor for SystemExecutor {
  fn run(&self, spec: &CommandSpec) -> Result<i32, ProcessError> {
    self.announce(spec);
    info!(cmd = %spec, "executing command");

    let status = self
      .command(spec)
      .status()
      .map_err(|e| Self::spawn_error(spec, e))?;

    let code = exit_code(status);
    debug!(cmd = %spec, code, "command finished");
    Ok(code)
  }

  fn capture(&self, spec: &CommandSpec) -> Result<Captured, ProcessError> {
    self.announce(spec);
    debug!(cmd = %spec, "capturing command output");

    let output = self
      .command(spec)
      .stdin(Stdio::null())
      .stderr(Stdio::null())
      .output()
      .map_err(|e| Self::spawn_error(spec, e))?;

    Ok(Captured {
      code: exit_code(output.status),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
  }

  fn which(&self, tool: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    match search_path {
      Some(path) => {
        let cwd = std::env::current_dir().ok()?;
        which::which_in(tool, Some(path), cwd).ok()
      }
      None => which::which(tool).ok(),
    }
  }
}

/// Exit code of a finished process; `1` when it was terminated without one.
pub fn exit_code(status: ExitStatus) -> i32 {
  status.code().unwrap_or(1)
}
