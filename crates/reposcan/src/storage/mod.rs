pub mod workdir;

pub use workdir::{sweep_stale_workdirs, WorkingDirectory, WORKDIR_PREFIX};
