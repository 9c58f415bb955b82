//! kiln-lib: build orchestration for native CMake projects.
//!
//! Everything the `kiln` binary does lives here:
//! - [`config`]: immutable settings from defaults, `kiln.toml` and `KILN_*`
//! - [`strategy`]: how a build runs on the current host (Docker, a downloaded
//!   compiler archive, or MSVC)
//! - [`toolchain`]: provisioning of the compilers a strategy needs
//! - [`project`]: CMake configure and build
//! - [`session`]: the per-invocation entry point used by the CLI

pub mod clean;
pub mod config;
pub mod consts;
pub mod error;
pub mod init;
pub mod launch;
pub mod platform;
pub mod process;
pub mod project;
pub mod session;
pub mod strategy;
pub mod toolchain;
pub mod util;

pub use config::Config;
pub use error::Error;
pub use process::{Executor, SystemExecutor};
pub use project::{BuildOptions, Profile};
pub use session::{Session, SessionInfo};
