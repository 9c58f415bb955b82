mod build;
mod clean;
mod configure;
mod docker_build;
mod info;
mod init;
mod run;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use configure::cmd_configure;
pub use docker_build::cmd_docker_build;
pub use info::cmd_info;
pub use init::cmd_init;
pub use run::cmd_run;
