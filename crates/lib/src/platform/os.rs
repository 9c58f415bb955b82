use std::fmt;

/// Host operating systems kiln knows how to drive a build on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
  Linux,
  Windows,
}

impl HostOs {
  /// Detect the current operating system at runtime
  ///
  /// Returns `None` if the OS is not supported
  pub fn current() -> Option<Self> {
    Self::from_identifier(std::env::consts::OS)
  }

  /// Map an OS identifier (as reported by `std::env::consts::OS`) to a host.
  pub fn from_identifier(id: &str) -> Option<Self> {
    match id.trim().to_ascii_lowercase().as_str() {
      "linux" => Some(Self::Linux),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Windows => "windows",
    }
  }

  /// File extension of native executables on this OS.
  pub fn exe_suffix(&self) -> &'static str {
    match self {
      Self::Linux => "",
      Self::Windows => ".exe",
    }
  }

  /// Whether a failed removal may be retried with `sudo`.
  pub fn supports_sudo(&self) -> bool {
    matches!(self, Self::Linux)
  }
}

impl fmt::Display for HostOs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
