//! Project configuration.
//!
//! A [`Config`] is built once at startup from built-in defaults, an optional
//! `kiln.toml` in the project root, and `KILN_*` environment overrides, then
//! handed by reference to every handler. Nothing mutates it afterwards.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CMAKE_CACHE_FILE, CONFIG_FILE, DEFAULT_BINARY_NAME, DEFAULT_BUILD_DIR, DEFAULT_CONTAINER_WORKSPACE,
  DEFAULT_DOCKER_IMAGE, DEFAULT_DOCKERFILE, DEFAULT_SOURCE_DIR, DEFAULT_WINDOWS_GENERATOR,
};
use crate::platform::paths::toolchains_dir;

/// Environment variable naming an alternative config file.
pub const ENV_CONFIG: &str = "KILN_CONFIG";
pub const ENV_BUILD_DIR: &str = "KILN_BUILD_DIR";
pub const ENV_HOST_OS: &str = "KILN_HOST_OS";
pub const ENV_LINUX_TOOLCHAIN: &str = "KILN_LINUX_TOOLCHAIN";
pub const ENV_DOCKER_IMAGE: &str = "KILN_DOCKER_IMAGE";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid config file {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },

  #[error("invalid value for {key}: {message}")]
  Invalid { key: String, message: String },

  #[error("linux toolchain mode 'archive' requires a [toolchain] section with a url")]
  MissingToolchain,
}

/// How the Linux compiler toolchain is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxToolchain {
  /// Build inside a container image with a pinned compiler.
  #[default]
  Docker,
  /// Download and unpack a compiler archive, then build natively.
  Archive,
}

impl LinuxToolchain {
  fn parse(value: &str) -> Result<Self, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
      "docker" => Ok(Self::Docker),
      "archive" => Ok(Self::Archive),
      other => Err(ConfigError::Invalid {
        key: ENV_LINUX_TOOLCHAIN.to_string(),
        message: format!("expected 'docker' or 'archive', got '{other}'"),
      }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerConfig {
  pub image: String,
  pub dockerfile: PathBuf,
  /// Mount point of the project root inside the container.
  pub workspace: String,
}

/// A downloadable compiler archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
  /// Directory name under the toolchain cache.
  pub name: String,
  /// Download URL. `{arch}` is replaced with the host architecture.
  pub url: String,
  /// Expected SHA-256 of the archive (lowercase hex).
  pub sha256: Option<String>,
  /// Leading path components dropped from every archive entry.
  pub strip_components: usize,
  /// C compiler, relative to the extracted toolchain root.
  pub c_compiler: PathBuf,
  /// C++ compiler, relative to the extracted toolchain root.
  pub cxx_compiler: PathBuf,
  pub generator: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsConfig {
  pub generator: String,
}

/// Immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
  pub project_root: PathBuf,
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub binary_name: String,
  /// Overrides host OS detection when set.
  pub host_os: Option<String>,
  pub linux_toolchain: LinuxToolchain,
  pub docker: DockerConfig,
  pub toolchain: Option<ArchiveConfig>,
  pub windows: WindowsConfig,
  pub toolchains_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
  source_dir: Option<PathBuf>,
  build_dir: Option<PathBuf>,
  binary_name: Option<String>,
  host_os: Option<String>,
  #[serde(default)]
  linux: LinuxSection,
  #[serde(default)]
  docker: DockerSection,
  toolchain: Option<ToolchainSection>,
  #[serde(default)]
  windows: WindowsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinuxSection {
  toolchain: Option<LinuxToolchain>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DockerSection {
  image: Option<String>,
  dockerfile: Option<PathBuf>,
  workspace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolchainSection {
  name: Option<String>,
  url: String,
  sha256: Option<String>,
  strip_components: Option<usize>,
  c_compiler: Option<PathBuf>,
  cxx_compiler: Option<PathBuf>,
  generator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowsSection {
  generator: Option<String>,
}

impl Config {
  /// Defaults for a project rooted at `project_root`, without reading any file
  /// or environment variable.
  pub fn defaults(project_root: impl Into<PathBuf>) -> Self {
    Self {
      project_root: project_root.into(),
      source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
      build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
      binary_name: DEFAULT_BINARY_NAME.to_string(),
      host_os: None,
      linux_toolchain: LinuxToolchain::Docker,
      docker: DockerConfig {
        image: DEFAULT_DOCKER_IMAGE.to_string(),
        dockerfile: PathBuf::from(DEFAULT_DOCKERFILE),
        workspace: DEFAULT_CONTAINER_WORKSPACE.to_string(),
      },
      toolchain: None,
      windows: WindowsConfig {
        generator: DEFAULT_WINDOWS_GENERATOR.to_string(),
      },
      toolchains_dir: toolchains_dir(),
    }
  }

  /// Load the configuration for the project at `project_root`.
  ///
  /// Reads `kiln.toml` (or the file named by `KILN_CONFIG`) when present and
  /// applies `KILN_*` environment overrides on top.
  pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
    let root = dunce::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    let mut config = Self::defaults(&root);

    let (path, required) = match std::env::var_os(ENV_CONFIG) {
      Some(p) => (root.join(p), true),
      None => (root.join(CONFIG_FILE), false),
    };

    if path.is_file() || required {
      let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
      })?;
      let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        message: e.to_string(),
      })?;
      debug!(path = %path.display(), "loaded config file");
      config.merge(file);
    }

    config.apply_env()?;
    config.validate()?;
    Ok(config)
  }

  /// Parse a config document on top of the defaults. Environment overrides are
  /// not applied.
  pub fn from_toml(project_root: impl Into<PathBuf>, content: &str) -> Result<Self, ConfigError> {
    let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
      path: PathBuf::from(CONFIG_FILE),
      message: e.to_string(),
    })?;
    let mut config = Self::defaults(project_root);
    config.merge(file);
    config.validate()?;
    Ok(config)
  }

  fn merge(&mut self, file: ConfigFile) {
    if let Some(v) = file.source_dir {
      self.source_dir = v;
    }
    if let Some(v) = file.build_dir {
      self.build_dir = v;
    }
    if let Some(v) = file.binary_name {
      self.binary_name = v;
    }
    if file.host_os.is_some() {
      self.host_os = file.host_os;
    }
    if let Some(v) = file.linux.toolchain {
      self.linux_toolchain = v;
    }
    if let Some(v) = file.docker.image {
      self.docker.image = v;
    }
    if let Some(v) = file.docker.dockerfile {
      self.docker.dockerfile = v;
    }
    if let Some(v) = file.docker.workspace {
      self.docker.workspace = v;
    }
    if let Some(v) = file.windows.generator {
      self.windows.generator = v;
    }
    self.toolchain = file.toolchain.map(|t| ArchiveConfig {
      name: t.name.unwrap_or_else(|| "default".to_string()),
      url: t.url,
      sha256: t.sha256.map(|s| s.to_ascii_lowercase()),
      strip_components: t.strip_components.unwrap_or(1),
      c_compiler: t.c_compiler.unwrap_or_else(|| PathBuf::from("bin/clang")),
      cxx_compiler: t.cxx_compiler.unwrap_or_else(|| PathBuf::from("bin/clang++")),
      generator: t.generator.unwrap_or_else(|| "Ninja".to_string()),
    });
  }

  fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Some(v) = env_value(ENV_BUILD_DIR) {
      self.build_dir = PathBuf::from(v);
    }
    if let Some(v) = env_value(ENV_HOST_OS) {
      self.host_os = Some(v);
    }
    if let Some(v) = env_value(ENV_LINUX_TOOLCHAIN) {
      self.linux_toolchain = LinuxToolchain::parse(&v)?;
    }
    if let Some(v) = env_value(ENV_DOCKER_IMAGE) {
      self.docker.image = v;
    }
    Ok(())
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.binary_name.is_empty() || self.binary_name.contains(['/', '\\']) {
      return Err(ConfigError::Invalid {
        key: "binary_name".to_string(),
        message: format!("'{}' must be a plain file name", self.binary_name),
      });
    }
    validate_build_dir(&self.build_dir)?;
    if let Some(toolchain) = &self.toolchain {
      let name = &toolchain.name;
      if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(ConfigError::Invalid {
          key: "toolchain.name".to_string(),
          message: format!("'{name}' must be a plain directory name"),
        });
      }
    }
    if self.linux_toolchain == LinuxToolchain::Archive && self.toolchain.is_none() {
      return Err(ConfigError::MissingToolchain);
    }
    Ok(())
  }

  /// Absolute path of the build output directory.
  pub fn build_path(&self) -> PathBuf {
    self.project_root.join(&self.build_dir)
  }

  /// Absolute path of the CMake source directory.
  pub fn source_path(&self) -> PathBuf {
    self.project_root.join(&self.source_dir)
  }

  /// Path of the CMake cache descriptor inside the build directory.
  pub fn cache_file(&self) -> PathBuf {
    self.build_path().join(CMAKE_CACHE_FILE)
  }
}

/// `clean` deletes the build directory recursively. It must be a relative
/// path naming a directory strictly below the project root, without `..`.
fn validate_build_dir(dir: &Path) -> Result<(), ConfigError> {
  let invalid = |message: &str| ConfigError::Invalid {
    key: "build_dir".to_string(),
    message: format!("'{}' {message}", dir.display()),
  };

  let mut depth = 0;
  for component in dir.components() {
    match component {
      Component::Normal(_) => depth += 1,
      Component::CurDir => {}
      Component::ParentDir => return Err(invalid("must not contain '..'")),
      Component::RootDir | Component::Prefix(_) => return Err(invalid("must be relative to the project root")),
    }
  }
  if depth == 0 {
    return Err(invalid("must name a directory below the project root"));
  }
  Ok(())
}

fn env_value(key: &str) -> Option<String> {
  std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn defaults_match_script_layout() {
    let config = Config::defaults("/project");
    assert_eq!(config.build_path(), PathBuf::from("/project/build"));
    assert_eq!(config.cache_file(), PathBuf::from("/project/build/CMakeCache.txt"));
    assert_eq!(config.docker.image, "gcc10-builder");
    assert_eq!(config.linux_toolchain, LinuxToolchain::Docker);
    assert_eq!(config.windows.generator, "Ninja");
  }

  #[test]
  fn toml_overrides_defaults() {
    let config = Config::from_toml(
      "/project",
      r#"
        binary_name = "viewer"
        build_dir = "out"

        [linux]
        toolchain = "archive"

        [toolchain]
        url = "https://example.com/clang-{arch}.tar.gz"
        sha256 = "ABCDEF"
      "#,
    )
    .unwrap();

    assert_eq!(config.binary_name, "viewer");
    assert_eq!(config.build_path(), PathBuf::from("/project/out"));
    assert_eq!(config.linux_toolchain, LinuxToolchain::Archive);

    let toolchain = config.toolchain.unwrap();
    assert_eq!(toolchain.name, "default");
    assert_eq!(toolchain.sha256.as_deref(), Some("abcdef"));
    assert_eq!(toolchain.strip_components, 1);
    assert_eq!(toolchain.c_compiler, PathBuf::from("bin/clang"));
  }

  #[test]
  fn unknown_keys_are_rejected() {
    let err = Config::from_toml("/project", "bogus = 1").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }

  #[test]
  fn archive_mode_requires_toolchain_section() {
    let err = Config::from_toml("/project", "[linux]\ntoolchain = \"archive\"").unwrap_err();
    assert!(matches!(err, ConfigError::MissingToolchain));
  }

  #[test]
  fn binary_name_must_be_plain() {
    let err = Config::from_toml("/project", "binary_name = \"../evil\"").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
  }

  #[test]
  fn build_dir_must_stay_below_project_root() {
    for dir in ["..", ".", "./", "", "/", "/tmp/out", "a/../..", "out/../build"] {
      let err = Config::from_toml("/project", &format!("build_dir = \"{dir}\"")).unwrap_err();
      assert!(
        matches!(&err, ConfigError::Invalid { key, .. } if key == "build_dir"),
        "{dir:?} was accepted: {err:?}"
      );
    }
    for dir in ["out", "./out", "build/linux"] {
      Config::from_toml("/project", &format!("build_dir = \"{dir}\"")).unwrap();
    }
  }

  #[test]
  #[serial]
  fn build_dir_env_cannot_point_at_filesystem_root() {
    let temp = TempDir::new().unwrap();

    temp_env::with_vars(
      [(ENV_CONFIG, None::<&str>), (ENV_BUILD_DIR, Some("/")), (ENV_LINUX_TOOLCHAIN, None)],
      || {
        let err = Config::load(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "build_dir"));
      },
    );
  }

  #[test]
  #[serial]
  fn env_overrides_file_values() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(CONFIG_FILE), "build_dir = \"from-file\"\n").unwrap();

    temp_env::with_vars(
      [
        (ENV_CONFIG, None::<&str>),
        (ENV_BUILD_DIR, Some("from-env")),
        (ENV_HOST_OS, Some("windows")),
        (ENV_DOCKER_IMAGE, Some("custom:latest")),
        (ENV_LINUX_TOOLCHAIN, None),
      ],
      || {
        let config = Config::load(temp.path()).unwrap();
        assert!(config.build_path().ends_with("from-env"));
        assert_eq!(config.host_os.as_deref(), Some("windows"));
        assert_eq!(config.docker.image, "custom:latest");
      },
    );
  }

  #[test]
  #[serial]
  fn missing_explicit_config_file_is_an_error() {
    let temp = TempDir::new().unwrap();

    temp_env::with_vars([(ENV_CONFIG, Some("nope.toml"))], || {
      let err = Config::load(temp.path()).unwrap_err();
      assert!(matches!(err, ConfigError::Read { .. }));
    });
  }

  #[test]
  #[serial]
  fn invalid_linux_toolchain_env_is_rejected() {
    let temp = TempDir::new().unwrap();

    temp_env::with_vars(
      [(ENV_CONFIG, None::<&str>), (ENV_LINUX_TOOLCHAIN, Some("podman"))],
      || {
        let err = Config::load(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
      },
    );
  }
}
