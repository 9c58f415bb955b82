//! Safe toolchain archive extraction.
//!
//! Extraction is all-or-nothing:
//! 1. Every entry (and every link target) is resolved against the extraction
//!    root first. One entry that would land outside it aborts the whole
//!    extraction before anything touches the disk. Paths may end at a symlink
//!    from the same archive but never pass through one.
//! 2. Entries are unpacked into a hidden staging directory next to the
//!    destination, which is renamed into place only when every entry
//!    succeeded.
//!
//! Supports `.tar.gz` / `.tgz` and `.tar`.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("unsupported archive format: {}", .0.display())]
  Unsupported(PathBuf),

  /// An entry would be written outside the extraction root.
  #[error("archive entry '{entry}' escapes the extraction root")]
  PathTraversal { entry: String },

  /// A link entry points outside the extraction root.
  #[error("archive entry '{entry}' links outside the extraction root (target '{target}')")]
  LinkTraversal { entry: String, target: String },

  #[error("failed to read archive {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to unpack '{entry}': {source}")]
  Unpack {
    entry: String,
    #[source]
    source: std::io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
  TarGz,
  Tar,
}

impl Format {
  fn detect(path: &Path) -> Result<Self, ExtractError> {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_ascii_lowercase())
      .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Ok(Self::TarGz)
    } else if name.ends_with(".tar") {
      Ok(Self::Tar)
    } else {
      Err(ExtractError::Unsupported(path.to_path_buf()))
    }
  }
}

/// What to do with one archive entry, decided during validation.
#[derive(Debug)]
enum Planned {
  Dir(PathBuf),
  File(PathBuf),
  Symlink(PathBuf),
  HardLink { path: PathBuf, target: PathBuf },
  Skip,
}

/// Extract `archive_path` into `dest`, dropping `strip_components` leading
/// path components from every entry.
///
/// `dest` is replaced as a whole on success and left untouched on failure.
///
/// # Returns
///
/// The number of entries written.
pub fn extract_archive(archive_path: &Path, dest: &Path, strip_components: usize) -> Result<usize, ExtractError> {
  let format = Format::detect(archive_path)?;

  let plan = validate(archive_path, format, strip_components)?;
  debug!(entries = plan.len(), archive = %archive_path.display(), "archive validated");

  let staging = staging_dir(dest)?;
  if staging.exists() {
    fs::remove_dir_all(&staging)?;
  }
  fs::create_dir_all(&staging)?;

  let written = match unpack(archive_path, format, &plan, &staging) {
    Ok(n) => n,
    Err(e) => {
      let _ = fs::remove_dir_all(&staging);
      return Err(e);
    }
  };

  if dest.exists() {
    fs::remove_dir_all(dest)?;
  }
  fs::rename(&staging, dest)?;

  info!(dest = %dest.display(), entries = written, "unpacked archive");
  Ok(written)
}

fn staging_dir(dest: &Path) -> Result<PathBuf, ExtractError> {
  let name = dest
    .file_name()
    .ok_or_else(|| ExtractError::Unsupported(dest.to_path_buf()))?;
  let parent = dest.parent().unwrap_or(Path::new("."));
  fs::create_dir_all(parent)?;
  Ok(parent.join(format!(".{}.partial", name.to_string_lossy())))
}

fn open(archive_path: &Path, format: Format) -> Result<Archive<Box<dyn Read>>, ExtractError> {
  let file = File::open(archive_path).map_err(|source| ExtractError::Read {
    path: archive_path.to_path_buf(),
    source,
  })?;
  let reader: Box<dyn Read> = match format {
    Format::TarGz => Box::new(GzDecoder::new(BufReader::new(file))),
    Format::Tar => Box::new(BufReader::new(file)),
  };
  Ok(Archive::new(reader))
}

/// First pass: resolve every entry without writing anything.
fn validate(archive_path: &Path, format: Format, strip: usize) -> Result<Vec<Planned>, ExtractError> {
  let read_err = |source: std::io::Error| ExtractError::Read {
    path: archive_path.to_path_buf(),
    source,
  };

  let mut archive = open(archive_path, format)?;
  let mut plan = Vec::new();
  let mut links = BTreeSet::new();

  for entry in archive.entries().map_err(read_err)? {
    let entry = entry.map_err(read_err)?;
    let raw = entry.path().map_err(read_err)?.into_owned();
    let name = raw.display().to_string();

    let Some(stripped) = strip_prefix(&raw, strip) else {
      plan.push(Planned::Skip);
      continue;
    };
    let Some(relative) = resolve_within(Path::new(""), &stripped, &links) else {
      return Err(ExtractError::PathTraversal { entry: name });
    };
    if relative.as_os_str().is_empty() {
      plan.push(Planned::Skip);
      continue;
    }
    if links.contains(&relative) {
      return Err(ExtractError::PathTraversal { entry: name });
    }

    let planned = match entry.header().entry_type() {
      EntryType::Directory => Planned::Dir(relative),
      EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => Planned::File(relative),
      EntryType::Symlink => {
        let target = link_target(&entry, archive_path)?;
        let base = relative.parent().unwrap_or(Path::new(""));
        if resolve_within(base, &target, &links).is_none() {
          return Err(ExtractError::LinkTraversal {
            entry: name,
            target: target.display().to_string(),
          });
        }
        links.insert(relative.clone());
        Planned::Symlink(relative)
      }
      EntryType::Link => {
        let target = link_target(&entry, archive_path)?;
        let resolved = strip_prefix(&target, strip).and_then(|t| resolve_within(Path::new(""), &t, &links));
        match resolved {
          Some(target) if !target.as_os_str().is_empty() && !links.contains(&target) => {
            Planned::HardLink { path: relative, target }
          }
          _ => {
            return Err(ExtractError::LinkTraversal {
              entry: name,
              target: target.display().to_string(),
            });
          }
        }
      }
      other => {
        debug!(entry = %name, kind = ?other, "skipping unsupported entry type");
        Planned::Skip
      }
    };
    plan.push(planned);
  }

  Ok(plan)
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, archive_path: &Path) -> Result<PathBuf, ExtractError> {
  entry
    .link_name()
    .map_err(|source| ExtractError::Read {
      path: archive_path.to_path_buf(),
      source,
    })?
    .map(|t| t.into_owned())
    .ok_or_else(|| ExtractError::Read {
      path: archive_path.to_path_buf(),
      source: std::io::Error::new(std::io::ErrorKind::InvalidData, "link entry without a target"),
    })
}

/// Second pass: write the validated entries into `root`.
fn unpack(archive_path: &Path, format: Format, plan: &[Planned], root: &Path) -> Result<usize, ExtractError> {
  let read_err = |source: std::io::Error| ExtractError::Read {
    path: archive_path.to_path_buf(),
    source,
  };

  let root = dunce::canonicalize(root)?;
  let mut archive = open(archive_path, format)?;
  let mut written = 0;

  for (entry, planned) in archive.entries().map_err(read_err)?.zip(plan) {
    let mut entry = entry.map_err(read_err)?;

    match planned {
      Planned::Skip => continue,
      Planned::Dir(path) => {
        let dest = root.join(path);
        prepare_parent(&root, &dest, path)?;
        fs::create_dir_all(&dest).map_err(unpack_err(path))?;
      }
      Planned::File(path) | Planned::Symlink(path) => {
        let dest = root.join(path);
        prepare_parent(&root, &dest, path)?;
        entry.unpack(&dest).map_err(unpack_err(path))?;
      }
      Planned::HardLink { path, target } => {
        let dest = root.join(path);
        prepare_parent(&root, &dest, path)?;
        let source = dunce::canonicalize(root.join(target)).map_err(unpack_err(path))?;
        if !source.starts_with(&root) {
          return Err(ExtractError::LinkTraversal {
            entry: path.display().to_string(),
            target: target.display().to_string(),
          });
        }
        if fs::hard_link(&source, &dest).is_err() {
          fs::copy(&source, &dest).map_err(unpack_err(path))?;
        }
      }
    }
    written += 1;
  }

  Ok(written)
}

/// Create the parent directory of `dest` and check that, with every symlink
/// already on disk followed, it is still inside `root` (canonical).
fn prepare_parent(root: &Path, dest: &Path, path: &Path) -> Result<(), ExtractError> {
  let parent = dest.parent().unwrap_or(root);
  fs::create_dir_all(parent).map_err(unpack_err(path))?;
  let real = dunce::canonicalize(parent).map_err(unpack_err(path))?;
  if !real.starts_with(root) {
    return Err(ExtractError::PathTraversal {
      entry: path.display().to_string(),
    });
  }
  Ok(())
}

fn unpack_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExtractError {
  let entry = path.display().to_string();
  move |source| ExtractError::Unpack { entry, source }
}

/// Drop the first `n` components. `None` when nothing is left.
fn strip_prefix(path: &Path, n: usize) -> Option<PathBuf> {
  let rest: PathBuf = path.components().skip(n).collect();
  (!rest.as_os_str().is_empty()).then_some(rest)
}

/// Lexically resolve `path` relative to `base` (itself relative to the
/// extraction root). Returns the root-relative result, or `None` when the
/// path is absolute, climbs above the root, or continues past one of the
/// symlinks in `links`.
fn resolve_within(base: &Path, path: &Path, links: &BTreeSet<PathBuf>) -> Option<PathBuf> {
  let mut parts: Vec<&OsStr> = Vec::new();

  for component in base.components().chain(path.components()) {
    if !parts.is_empty() && links.contains(&parts.iter().collect::<PathBuf>()) {
      return None;
    }
    match component {
      Component::Normal(part) => parts.push(part),
      Component::CurDir => {}
      Component::ParentDir => {
        parts.pop()?;
      }
      Component::RootDir | Component::Prefix(_) => return None,
    }
  }

  Some(parts.iter().collect())
}
