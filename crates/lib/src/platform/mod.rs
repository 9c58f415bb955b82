//! Host detection.

pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;

use arch::Arch;
use os::HostOs;

/// Architecture and OS of a host, rendered as a triple such as `x86_64-linux`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: HostOs,
}

impl Platform {
  pub fn new(arch: Arch, os: HostOs) -> Self {
    Self { arch, os }
  }

  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.triple())
  }
}
