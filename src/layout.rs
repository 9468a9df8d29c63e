//! On-disk layout shared by every component.
//!
//! ```text
//! <root>/
//!   installs/<version>/                    prefix of one installed version
//!   installs/<version>/.altpy-receipt.json marks the version complete
//!   installs/.pending/<version>.json       in-progress install record
//!   staging/<version>.<pid>/               private workspace of one attempt
//!   bin/altpy-python<version>              published executable (default bin dir)
//! ```
//!
//! `staging` lives next to `installs` so moving a finished prefix into place
//! is a same-filesystem `rename`.

use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;
use crate::runtime::path::normalize_path;
use crate::version::PythonVersion;

pub const RECEIPT_FILE: &str = ".altpy-receipt.json";
const PENDING_DIR: &str = ".pending";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    bin_dir: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, bin_dir: Option<PathBuf>) -> Self {
        let root = root.into();
        let bin_dir = bin_dir.unwrap_or_else(|| root.join("bin"));
        Self { root, bin_dir }
    }

    /// Resolve the layout from explicit settings, falling back to `~/.altpy`.
    ///
    /// Relative paths are taken from the current directory; the build
    /// toolchain needs an absolute prefix.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime + ?Sized>(
        runtime: &R,
        root: Option<PathBuf>,
        bin_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let root = match root {
            Some(path) => absolute(runtime, path)?,
            None => absolute(runtime, default_root(runtime)?)?,
        };
        let bin_dir = bin_dir.map(|path| absolute(runtime, path)).transpose()?;
        info!("Using altpy root: {}", root.display());
        Ok(Self::new(root, bin_dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn installs_dir(&self) -> PathBuf {
        self.root.join("installs")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.installs_dir().join(PENDING_DIR)
    }

    /// Installation prefix of `version`; the only place its build may install into.
    pub fn prefix(&self, version: &PythonVersion) -> PathBuf {
        self.installs_dir().join(version.to_string())
    }

    pub fn receipt_path(&self, version: &PythonVersion) -> PathBuf {
        self.prefix(version).join(RECEIPT_FILE)
    }

    pub fn pending_path(&self, version: &PythonVersion) -> PathBuf {
        self.pending_dir().join(format!("{}.json", version))
    }

    /// Private workspace for one install attempt by process `pid`.
    pub fn workspace(&self, version: &PythonVersion, pid: u32) -> PathBuf {
        self.staging_dir().join(format!("{}.{}", version, pid))
    }

    pub fn interpreter(&self, version: &PythonVersion) -> PathBuf {
        self.prefix(version)
            .join("bin")
            .join(version.interpreter_name())
    }

    pub fn link_path(&self, version: &PythonVersion) -> PathBuf {
        self.bin_dir.join(version.link_name())
    }
}

fn absolute<R: Runtime + ?Sized>(runtime: &R, path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(normalize_path(&runtime.current_dir()?.join(path)))
}

/// Get the default altpy root directory (`~/.altpy`).
#[tracing::instrument(skip(runtime))]
pub fn default_root<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory; pass --root or set ALTPY_ROOT")?;
    Ok(home_dir.join(".altpy"))
}
