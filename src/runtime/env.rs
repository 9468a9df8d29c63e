//! Home directory and host information.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn home_dir_impl(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    pub(crate) fn current_dir_impl(&self) -> Result<PathBuf> {
        std::env::current_dir().context("Failed to get current directory")
    }

    pub(crate) fn available_parallelism_impl(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub(crate) fn process_id_impl(&self) -> u32 {
        std::process::id()
    }
}
