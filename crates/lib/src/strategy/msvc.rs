use std::path::PathBuf;

use super::{Strategy, cmake_configure_args, host_core_count, slash_path};
use crate::config::Config;
use crate::platform::os::HostOs;
use crate::process::{CommandSpec, Executor};
use crate::project::Profile;
use crate::toolchain::ToolchainError;
use crate::toolchain::env::EnvSnapshot;
use crate::toolchain::fetch::Progress;
use crate::toolchain::msvc;

/// Windows builds with the installed MSVC toolchain. CMake and Ninja are
/// looked up in the developer environment, which ships both.
#[derive(Debug, Clone)]
pub struct MsvcStrategy {
  roots: Vec<PathBuf>,
  generator: String,
  source_path: PathBuf,
  build_path: PathBuf,
  binary_name: String,
}

impl MsvcStrategy {
  pub fn new(config: &Config) -> Self {
    Self::with_roots(config, msvc::default_roots())
  }

  /// Search Visual Studio installations under `roots` instead of the
  /// `ProgramFiles` directories.
  pub fn with_roots(config: &Config, roots: Vec<PathBuf>) -> Self {
    Self {
      roots,
      generator: config.windows.generator.clone(),
      source_path: config.source_path(),
      build_path: config.build_path(),
      binary_name: config.binary_name.clone(),
    }
  }

  fn is_visual_studio_generator(&self) -> bool {
    self.generator.starts_with("Visual Studio")
  }
}

impl Strategy for MsvcStrategy {
  fn name(&self) -> &'static str {
    "msvc"
  }

  fn host(&self) -> HostOs {
    HostOs::Windows
  }

  fn host_tools(&self) -> Vec<&'static str> {
    Vec::new()
  }

  fn toolchain_tools(&self) -> Vec<&'static str> {
    if self.generator.eq_ignore_ascii_case("ninja") {
      vec!["cmake", "ninja"]
    } else {
      vec!["cmake"]
    }
  }

  fn provision(&self, executor: &dyn Executor, _progress: Progress<'_>) -> Result<EnvSnapshot, ToolchainError> {
    msvc::discover(executor, &self.roots)
  }

  fn configure_command(&self, profile: Profile) -> CommandSpec {
    let cmd = CommandSpec::new("cmake").args(cmake_configure_args(
      &slash_path(&self.source_path),
      &slash_path(&self.build_path),
      &self.generator,
      profile,
      &self.binary_name,
    ));
    if self.is_visual_studio_generator() {
      cmd.args(["-A", "x64"])
    } else {
      cmd
    }
  }

  fn build_command(&self, profile: Profile, jobs: usize) -> CommandSpec {
    CommandSpec::new("cmake")
      .args(["--build".to_string(), slash_path(&self.build_path)])
      .args(["--config", profile.build_type()])
      .args(["--parallel".to_string(), jobs.to_string()])
  }

  fn core_count(&self, _executor: &dyn Executor) -> usize {
    host_core_count()
  }

  /// Multi-config generators write into `Release/` or `Debug/`; Ninja writes
  /// into the build directory itself.
  fn binary_candidates(&self) -> Vec<PathBuf> {
    let exe = format!("{}{}", self.binary_name, HostOs::Windows.exe_suffix());
    vec![
      self.build_path.join("Release").join(&exe),
      self.build_path.join("Debug").join(&exe),
      self.build_path.join(&exe),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::toolchain::env::EnvParseError;
  use crate::util::testutil::RecordingExecutor;
  use tempfile::TempDir;

  fn strategy(generator: &str) -> MsvcStrategy {
    let mut config = Config::defaults("/project");
    config.windows.generator = generator.to_string();
    MsvcStrategy::with_roots(&config, Vec::new())
  }

  #[test]
  fn ninja_generator_needs_ninja_from_environment() {
    let strategy = strategy("Ninja");
    assert!(strategy.host_tools().is_empty());
    assert_eq!(strategy.toolchain_tools(), vec!["cmake", "ninja"]);
  }

  #[test]
  fn visual_studio_generator_targets_x64() {
    let cmd = strategy("Visual Studio 17 2022").configure_command(Profile::Release);
    assert!(cmd.has_arg("Visual Studio 17 2022"));
    assert!(cmd.to_string().ends_with("-A x64"));
  }

  #[test]
  fn build_passes_config_and_parallelism() {
    let cmd = strategy("Ninja").build_command(Profile::Debug, 16);
    assert_eq!(cmd.to_string(), "cmake --build /project/build --config Debug --parallel 16");
  }

  #[test]
  fn candidates_prefer_release_then_debug_then_root() {
    let candidates = strategy("Ninja").binary_candidates();
    assert_eq!(
      candidates,
      vec![
        PathBuf::from("/project/build/Release/app.exe"),
        PathBuf::from("/project/build/Debug/app.exe"),
        PathBuf::from("/project/build/app.exe"),
      ]
    );
  }

  #[test]
  fn provision_captures_environment_from_vcvars() {
    let temp = TempDir::new().unwrap();
    let script = temp
      .path()
      .join("Microsoft Visual Studio/2019/BuildTools/VC/Auxiliary/Build/vcvars64.bat");
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, "@echo off\n").unwrap();

    let config = Config::defaults("/project");
    let strategy = MsvcStrategy::with_roots(&config, vec![temp.path().to_path_buf()]);
    let executor = RecordingExecutor::new().respond("vcvars64.bat", 0, "Path=C:\\VS\nINCLUDE=i\nLIB=l\n");

    let env = strategy.provision(&executor, &mut |_, _| {}).unwrap();
    assert_eq!(env.get("PATH"), Some("C:\\VS"));
  }

  #[test]
  fn provision_without_visual_studio_fails() {
    let temp = TempDir::new().unwrap();
    let config = Config::defaults("/project");
    let strategy = MsvcStrategy::with_roots(&config, vec![temp.path().to_path_buf()]);
    let executor = RecordingExecutor::new();

    let err = strategy.provision(&executor, &mut |_, _| {}).unwrap_err();
    assert!(matches!(err, ToolchainError::MsvcNotFound { .. }));
    assert!(executor.commands().is_empty());
  }

  #[test]
  fn provision_rejects_empty_environment() {
    let temp = TempDir::new().unwrap();
    let script = temp
      .path()
      .join("Microsoft Visual Studio/2022/Community/VC/Auxiliary/Build/vcvars64.bat");
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, "").unwrap();

    let config = Config::defaults("/project");
    let strategy = MsvcStrategy::with_roots(&config, vec![temp.path().to_path_buf()]);
    let executor = RecordingExecutor::new().respond("vcvars64.bat", 0, "");

    let err = strategy.provision(&executor, &mut |_, _| {}).unwrap_err();
    assert!(matches!(err, ToolchainError::Environment(EnvParseError::Empty)));
  }
}
