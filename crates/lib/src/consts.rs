//! Names and defaults shared across the crate.

/// Application name used for cache and config directories.
pub const APP_NAME: &str = "kiln";

/// Project-level configuration file, looked up in the project root.
pub const CONFIG_FILE: &str = "kiln.toml";

/// CMake cache descriptor inside the build directory.
pub const CMAKE_CACHE_FILE: &str = "CMakeCache.txt";

/// Job count used when the CPU count cannot be detected.
pub const DEFAULT_JOBS: usize = 4;

pub const DEFAULT_BUILD_DIR: &str = "build";
pub const DEFAULT_SOURCE_DIR: &str = ".";
pub const DEFAULT_BINARY_NAME: &str = "app";
pub const DEFAULT_DOCKER_IMAGE: &str = "gcc10-builder";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
pub const DEFAULT_CONTAINER_WORKSPACE: &str = "/workspace";
pub const DEFAULT_WINDOWS_GENERATOR: &str = "Ninja";
