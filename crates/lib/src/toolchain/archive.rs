//! Downloaded compiler toolchains.
//!
//! A toolchain archive is fetched once into the download cache, unpacked under
//! `<toolchains>/<name>`, and the archive is deleted. Later runs find the
//! compilers already in place and skip the network entirely.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::ArchiveConfig;
use crate::platform::arch::Arch;
use crate::toolchain::ToolchainError;
use crate::toolchain::extract::extract_archive;
use crate::toolchain::fetch::{Progress, download_blocking};

/// Where a toolchain lives (or will live) on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainLocation {
  pub root: PathBuf,
  pub c_compiler: PathBuf,
  pub cxx_compiler: PathBuf,
}

impl ToolchainLocation {
  pub fn new(toolchain: &ArchiveConfig, toolchains_dir: &Path) -> Self {
    let root = toolchains_dir.join(&toolchain.name);
    Self {
      c_compiler: root.join(&toolchain.c_compiler),
      cxx_compiler: root.join(&toolchain.cxx_compiler),
      root,
    }
  }

  /// Both compilers exist.
  pub fn is_installed(&self) -> bool {
    self.c_compiler.is_file() && self.cxx_compiler.is_file()
  }
}

/// Substitute `{arch}` in a download URL.
pub fn expand_url(url: &str, arch: Arch) -> String {
  url.replace("{arch}", arch.as_str())
}

/// Make sure the toolchain is unpacked, downloading it if necessary.
pub fn ensure_toolchain(
  toolchain: &ArchiveConfig,
  toolchains_dir: &Path,
  downloads_dir: &Path,
  arch: Arch,
  progress: Progress<'_>,
) -> Result<ToolchainLocation, ToolchainError> {
  let location = ToolchainLocation::new(toolchain, toolchains_dir);
  if location.is_installed() {
    info!(root = %location.root.display(), "toolchain already installed");
    return Ok(location);
  }

  let url = expand_url(&toolchain.url, arch);
  let archive = download_blocking(&url, downloads_dir, toolchain.sha256.as_deref(), progress)?;

  extract_archive(&archive, &location.root, toolchain.strip_components)?;
  fs::remove_file(&archive)?;

  if !location.c_compiler.is_file() {
    return Err(ToolchainError::CompilerMissing(location.c_compiler));
  }
  if !location.cxx_compiler.is_file() {
    return Err(ToolchainError::CompilerMissing(location.cxx_compiler));
  }

  info!(root = %location.root.display(), "toolchain installed");
  Ok(location)
}

#[cfg(test)]
mod tests {
  use super::*;
  use flate2::Compression;
  use flate2::write::GzEncoder;
  use tempfile::TempDir;

  fn toolchain(url: String) -> ArchiveConfig {
    ArchiveConfig {
      name: "clang".to_string(),
      url,
      sha256: None,
      strip_components: 1,
      c_compiler: PathBuf::from("bin/clang"),
      cxx_compiler: PathBuf::from("bin/clang++"),
      generator: "Ninja".to_string(),
    }
  }

  fn tar_gz(files: &[&str]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for name in files {
      let data = b"#!/bin/sh\n";
      let mut header = tar::Header::new_gnu();
      header.set_size(data.len() as u64);
      header.set_mode(0o755);
      builder.append_data(&mut header, name, &data[..]).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
  }

  #[test]
  fn expand_url_substitutes_arch() {
    assert_eq!(
      expand_url("https://example.com/clang-{arch}-linux.tar.gz", Arch::Aarch64),
      "https://example.com/clang-aarch64-linux.tar.gz"
    );
  }

  #[test]
  fn installed_toolchain_skips_download() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("toolchains/clang/bin");
    fs::create_dir_all(&bin).unwrap();
    fs::write(bin.join("clang"), "").unwrap();
    fs::write(bin.join("clang++"), "").unwrap();

    // Unroutable URL: any download attempt would fail the test.
    let config = toolchain("http://127.0.0.1:1/never.tar.gz".to_string());
    let location = ensure_toolchain(
      &config,
      &temp.path().join("toolchains"),
      &temp.path().join("downloads"),
      Arch::X86_64,
      &mut |_, _| {},
    )
    .unwrap();

    assert_eq!(location.c_compiler, bin.join("clang"));
  }

  #[test]
  fn downloads_extracts_and_removes_archive() {
    let mut server = mockito::Server::new();
    let _mock = server
      .mock("GET", "/clang-x86_64.tar.gz")
      .with_status(200)
      .with_body(tar_gz(&["clang-17/bin/clang", "clang-17/bin/clang++"]))
      .create();

    let temp = TempDir::new().unwrap();
    let downloads = temp.path().join("downloads");
    let config = toolchain(format!("{}/clang-{{arch}}.tar.gz", server.url()));

    let location = ensure_toolchain(
      &config,
      &temp.path().join("toolchains"),
      &downloads,
      Arch::X86_64,
      &mut |_, _| {},
    )
    .unwrap();

    assert!(location.is_installed());
    assert!(!downloads.join("clang-x86_64.tar.gz").exists());
  }

  #[test]
  fn archive_without_compiler_is_reported() {
    let mut server = mockito::Server::new();
    let _mock = server
      .mock("GET", "/gcc.tar.gz")
      .with_status(200)
      .with_body(tar_gz(&["gcc-13/bin/gcc"]))
      .create();

    let temp = TempDir::new().unwrap();
    let config = toolchain(format!("{}/gcc.tar.gz", server.url()));

    let err = ensure_toolchain(
      &config,
      &temp.path().join("toolchains"),
      &temp.path().join("downloads"),
      Arch::X86_64,
      &mut |_, _| {},
    )
    .unwrap_err();

    assert!(matches!(err, ToolchainError::CompilerMissing(_)));
  }
}
