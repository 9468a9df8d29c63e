pub mod config;
mod install;
mod list;
mod remove;

pub use config::{Config, Settings};
pub use install::{InstallRequest, install};
pub use list::{available, list};
pub use remove::{clean, remove};

use crate::error::Result;
use crate::version::PythonVersion;

/// Parse a user-supplied version, failing with `InvalidVersion`.
pub(crate) fn parse_version(input: &str) -> Result<PythonVersion> {
    input.trim().parse()
}
