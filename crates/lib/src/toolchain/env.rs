//! Key/value environment captured from a developer-environment script.

use std::collections::BTreeMap;
use std::ffi::OsStr;

use thiserror::Error;

/// Variables a usable MSVC environment must define.
pub const REQUIRED_MSVC_VARS: [&str; 3] = ["PATH", "INCLUDE", "LIB"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvParseError {
  /// The script produced no `KEY=VALUE` lines at all.
  #[error("environment script produced no variables")]
  Empty,

  /// A variable the toolchain needs is absent.
  #[error("environment script did not set {0}")]
  MissingVariable(String),
}

/// An environment as printed by `set` (one `KEY=VALUE` per line).
///
/// Keys keep their original spelling; lookups are case-insensitive because
/// Windows environment names are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
  vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
  /// An empty snapshot; commands run with the inherited environment.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Parse `set`-style output.
  ///
  /// Lines without `=` and hidden per-drive entries (`=C:=C:\`) are skipped.
  /// Fails with [`EnvParseError::Empty`] when nothing parses.
  pub fn parse(output: &str) -> Result<Self, EnvParseError> {
    let mut vars = BTreeMap::new();

    for line in output.lines() {
      let line = line.trim_end_matches('\r');
      let Some((key, value)) = line.split_once('=') else {
        continue;
      };
      if key.is_empty() || key.contains(char::is_whitespace) {
        continue;
      }
      vars.insert(key.to_string(), value.to_string());
    }

    if vars.is_empty() {
      return Err(EnvParseError::Empty);
    }
    Ok(Self { vars })
  }

  /// Parse and check that every name in `required` is present.
  pub fn parse_requiring(output: &str, required: &[&str]) -> Result<Self, EnvParseError> {
    let snapshot = Self::parse(output)?;
    for name in required {
      if snapshot.get(name).is_none() {
        return Err(EnvParseError::MissingVariable((*name).to_string()));
      }
    }
    Ok(snapshot)
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .vars
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(key))
      .map(|(_, v)| v.as_str())
  }

  /// The captured `PATH`, used to look up tools the script put in scope.
  pub fn search_path(&self) -> Option<&OsStr> {
    self.get("PATH").map(OsStr::new)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }
}
