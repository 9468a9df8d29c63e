//! Compiling a CPython source archive into its private prefix.

use async_trait::async_trait;
use log::{debug, warn};
#[cfg(test)]
use mockall::automock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::TarGzExtractor;
use crate::cleanup::SharedCleanupContext;
use crate::error::{Error, Result};
use crate::runtime::{Runtime, rebase_under};
use crate::store::VersionStore;
use crate::toolchain::{Invocation, Toolchain};
use crate::version::PythonVersion;


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Parallel make jobs.
    pub jobs: usize,
    /// Pass `--enable-optimizations` (PGO + LTO) to configure.
    pub optimizations: bool,
    /// Extra arguments appended to the configure invocation.
    pub configure_args: Vec<String>,
    /// Echo toolchain output while it runs.
    pub verbose: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            optimizations: true,
            configure_args: Vec::new(),
            verbose: false,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build `archive` and move the result into the prefix of `version`,
    /// using `workspace` as private scratch space. Returns the prefix.
    ///
    /// Scratch paths created along the way are registered with `cleanup`.
    async fn build(
        &self,
        version: &PythonVersion,
        archive: &Path,
        workspace: &Path,
        options: &BuildOptions,
        cleanup: SharedCleanupContext,
    ) -> Result<PathBuf>;
}

pub struct SourceBuilder<R: Runtime, T: Toolchain> {
    runtime: Arc<R>,
    store: VersionStore<R>,
    toolchain: T,
}

impl<R: Runtime, T: Toolchain> SourceBuilder<R, T> {
    pub fn new(runtime: Arc<R>, store: VersionStore<R>, toolchain: T) -> Self {
        Self {
            runtime,
            store,
            toolchain,
        }
    }

    /// The configure, make and install steps for `version`, in order.
    pub fn plan(
        &self,
        version: &PythonVersion,
        source_dir: &Path,
        image_dir: &Path,
        options: &BuildOptions,
    ) -> Vec<Invocation> {
        let prefix = self.store.layout().prefix(version);
        let prefix = prefix.to_string_lossy();

        let mut configure = Invocation::new("./configure", source_dir).args([
            format!("--prefix={}", prefix),
            format!("--exec_prefix={}", prefix),
            "--with-ensurepip=install".to_string(),
        ]);
        if options.optimizations {
            configure = configure.arg("--enable-optimizations");
        }
        configure = configure.args(options.configure_args.iter().cloned());

        vec![
            configure,
            Invocation::new("make", source_dir).arg(format!("-j{}", options.jobs.max(1))),
            Invocation::new("make", source_dir).args([
                "altinstall".to_string(),
                format!("DESTDIR={}", image_dir.to_string_lossy()),
            ]),
        ]
    }

    async fn run_step(&self, invocation: &Invocation) -> Result<()> {
        println!("{:>12} {}", "running", invocation.step());
        let out = self.toolchain.run(invocation).await?;
        if out.success() {
            return Ok(());
        }
        Err(Error::BuildFailed {
            step: invocation.step(),
            status: out.describe_status(),
            output: out.output,
        })
    }

    async fn build_in(
        &self,
        version: &PythonVersion,
        archive: &Path,
        source_dir: &Path,
        image_dir: &Path,
        options: &BuildOptions,
        cleanup: SharedCleanupContext,
    ) -> Result<PathBuf> {
        println!("{:>12} {}", "unpacking", version.archive_name());
        TarGzExtractor.extract(self.runtime.as_ref(), archive, source_dir, Some(cleanup))?;

        for invocation in self.plan(version, source_dir, image_dir, options) {
            self.run_step(&invocation).await?;
        }

        let layout = self.store.layout();
        let prefix = layout.prefix(version);
        let staged = rebase_under(image_dir, &prefix);
        let staged_interpreter = rebase_under(image_dir, &layout.interpreter(version));
        if !self.runtime.is_executable(&staged_interpreter) {
            return Err(Error::BuildFailed {
                step: "make altinstall".to_string(),
                status: format!("no interpreter at {}", staged_interpreter.display()),
                output: String::new(),
            });
        }

        if self.runtime.exists(&prefix) {
            return Err(anyhow::anyhow!("Prefix {:?} appeared during the build", prefix).into());
        }
        self.runtime.create_dir_all(&layout.installs_dir())?;
        debug!("Moving {:?} to {:?}", staged, prefix);
        self.runtime.rename(&staged, &prefix)?;
        Ok(prefix)
    }
}

#[async_trait]
impl<R: Runtime + 'static, T: Toolchain> Builder for SourceBuilder<R, T> {
    #[tracing::instrument(skip(self, options, cleanup))]
    async fn build(
        &self,
        version: &PythonVersion,
        archive: &Path,
        workspace: &Path,
        options: &BuildOptions,
        cleanup: SharedCleanupContext,
    ) -> Result<PathBuf> {
        if self.store.is_installed(version) {
            return Err(Error::AlreadyInstalled {
                version: version.to_string(),
            });
        }

        let source_dir = workspace.join("src");
        let image_dir = workspace.join("image");
        let result = self
            .build_in(version, archive, &source_dir, &image_dir, options, cleanup)
            .await;

        for dir in [&source_dir, &image_dir] {
            if self.runtime.exists(dir)
                && let Err(e) = self.runtime.remove_dir_all(dir)
            {
                warn!("Failed to remove {:?}: {:#}", dir, e);
            }
        }
        result
    }
}
