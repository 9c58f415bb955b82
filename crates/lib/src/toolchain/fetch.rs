//! Toolchain archive download.
//!
//! Streams the response body to disk chunk by chunk, reporting progress by
//! byte count and hashing as it goes. Nothing is retried: a network error or
//! a non-success status is returned to the caller as-is.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::toolchain::ToolchainError;

/// Progress callback: `(bytes downloaded so far, total size if known)`.
pub type Progress<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// Download `url` into `dest_dir`.
///
/// The body is written to `<file>.part` and renamed once complete and (when
/// `expected_sha256` is given) verified, so a failed download never leaves a
/// file that looks finished.
///
/// # Returns
///
/// The path to the downloaded file on success.
pub async fn download(
  url: &str,
  dest_dir: &Path,
  expected_sha256: Option<&str>,
  progress: Progress<'_>,
) -> Result<PathBuf, ToolchainError> {
  info!(url = %url, "downloading toolchain archive");

  fs::create_dir_all(dest_dir).await?;

  let filename = url_to_filename(url);
  let dest_path = dest_dir.join(&filename);
  let partial_path = dest_dir.join(format!("{filename}.part"));

  let result = stream_to_file(url, &partial_path, expected_sha256, progress).await;
  if let Err(e) = result {
    let _ = fs::remove_file(&partial_path).await;
    return Err(e);
  }

  fs::rename(&partial_path, &dest_path).await?;
  Ok(dest_path)
}

async fn stream_to_file(
  url: &str,
  path: &Path,
  expected_sha256: Option<&str>,
  progress: Progress<'_>,
) -> Result<(), ToolchainError> {
  let fetch_failed = |e: reqwest::Error| ToolchainError::Download {
    url: url.to_string(),
    message: e.to_string(),
  };

  let mut response = reqwest::get(url).await.map_err(fetch_failed)?;

  if !response.status().is_success() {
    return Err(ToolchainError::Download {
      url: url.to_string(),
      message: format!("HTTP {}", response.status()),
    });
  }

  let total = response.content_length();
  let mut file = fs::File::create(path).await?;
  let mut hasher = Sha256::new();
  let mut downloaded: u64 = 0;

  progress(0, total);
  while let Some(chunk) = response.chunk().await.map_err(fetch_failed)? {
    hasher.update(&chunk);
    file.write_all(&chunk).await?;
    downloaded += chunk.len() as u64;
    progress(downloaded, total);
  }
  file.flush().await?;

  let actual = hex::encode(hasher.finalize());
  debug!(sha256 = %actual, size = downloaded, "download complete");

  if let Some(expected) = expected_sha256 {
    if !actual.eq_ignore_ascii_case(expected) {
      return Err(ToolchainError::HashMismatch {
        url: url.to_string(),
        expected: expected.to_string(),
        actual,
      });
    }
  }

  Ok(())
}

/// Blocking wrapper around [`download`] on a current-thread runtime.
pub fn download_blocking(
  url: &str,
  dest_dir: &Path,
  expected_sha256: Option<&str>,
  progress: Progress<'_>,
) -> Result<PathBuf, ToolchainError> {
  let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
  runtime.block_on(download(url, dest_dir, expected_sha256, progress))
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to hash of URL
/// if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split(['?', '#']).next().unwrap_or(filename);

    // Sanitize: only allow alphanumeric, dash, underscore, dot, plus
    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '+') {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
  }

  #[test]
  fn url_to_filename_simple() {
    assert_eq!(url_to_filename("https://example.com/file.tar.gz"), "file.tar.gz");
  }

  #[test]
  fn url_to_filename_with_query() {
    assert_eq!(url_to_filename("https://example.com/file.tar.gz?token=abc"), "file.tar.gz");
  }

  #[test]
  fn url_to_filename_keeps_llvm_style_names() {
    assert_eq!(
      url_to_filename("https://github.com/llvm/llvm-project/releases/download/llvmorg-17.0.6/clang+llvm-17.0.6-x86_64-linux-gnu.tar.gz"),
      "clang+llvm-17.0.6-x86_64-linux-gnu.tar.gz"
    );
  }

  #[test]
  fn url_to_filename_fallback_for_empty() {
    assert!(url_to_filename("https://example.com/").starts_with("download_"));
  }

  #[tokio::test]
  async fn download_streams_body_and_reports_progress() {
    let body = vec![7u8; 64 * 1024];
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/gcc.tar.gz")
      .with_status(200)
      .with_body(&body)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let mut last = (0, None);
    let mut progress = |done: u64, total: Option<u64>| last = (done, total);

    let path = download(
      &format!("{}/gcc.tar.gz", server.url()),
      temp.path(),
      Some(sha256_hex(&body).as_str()),
      &mut progress,
    )
    .await
    .unwrap();

    mock.assert_async().await;
    assert_eq!(path, temp.path().join("gcc.tar.gz"));
    assert_eq!(std::fs::read(&path).unwrap(), body);
    assert_eq!(last.0, body.len() as u64);
    assert!(!temp.path().join("gcc.tar.gz.part").exists());
  }

  #[tokio::test]
  async fn non_success_status_is_a_download_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/missing.tar.gz").with_status(404).create_async().await;

    let temp = TempDir::new().unwrap();
    let err = download(
      &format!("{}/missing.tar.gz", server.url()),
      temp.path(),
      None,
      &mut |_, _| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ToolchainError::Download { ref message, .. } if message.contains("404")));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
  }

  #[tokio::test]
  async fn hash_mismatch_leaves_nothing_behind() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/gcc.tar.gz")
      .with_status(200)
      .with_body("not the archive you expected")
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let err = download(
      &format!("{}/gcc.tar.gz", server.url()),
      temp.path(),
      Some("0".repeat(64).as_str()),
      &mut |_, _| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ToolchainError::HashMismatch { .. }));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
  }

  #[tokio::test]
  async fn connection_refused_is_a_download_error() {
    let temp = TempDir::new().unwrap();
    let err = download("http://127.0.0.1:1/gcc.tar.gz", temp.path(), None, &mut |_, _| {})
      .await
      .unwrap_err();

    assert!(matches!(err, ToolchainError::Download { .. }));
  }
}
