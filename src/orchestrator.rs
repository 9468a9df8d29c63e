//! Install, remove and clean, with rollback on failure.
//!
//! An install moves through `absent → fetching → building → linking →
//! installed`. Any failure, including an interrupt, moves it to `failed`
//! and rolls it back to `absent`: the link is retracted if this attempt
//! published it, the entry and prefix are purged, and the workspace is
//! deleted.

use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::builder::{BuildOptions, Builder};
use crate::cleanup::{self, SharedCleanupContext};
use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::link::LinkManager;
use crate::runtime::Runtime;
use crate::store::VersionStore;
use crate::version::PythonVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Absent,
    Fetching,
    Building,
    Linking,
    Installed,
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::Absent => "absent",
            InstallState::Fetching => "fetching",
            InstallState::Building => "building",
            InstallState::Linking => "linking",
            InstallState::Installed => "installed",
            InstallState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Remove and rebuild the version if it is already installed.
    pub reinstall: bool,
    pub build: BuildOptions,
}

/// What an install produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub version: PythonVersion,
    pub prefix: PathBuf,
    pub link: PathBuf,
}

/// What a successful [`Orchestrator::clean`] deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: Vec<PythonVersion>,
    /// Leftover workspaces and trash under the staging directory.
    pub swept: Vec<PathBuf>,
}

pub struct Orchestrator<R: Runtime, F: SourceFetcher, B: Builder> {
    runtime: Arc<R>,
    store: VersionStore<R>,
    links: LinkManager<R>,
    fetcher: F,
    builder: B,
}

impl<R: Runtime + 'static, F: SourceFetcher, B: Builder> Orchestrator<R, F, B> {
    pub fn new(runtime: Arc<R>, store: VersionStore<R>, fetcher: F, builder: B) -> Self {
        let links = LinkManager::new(Arc::clone(&runtime), store.layout().clone());
        Self {
            runtime,
            store,
            links,
            fetcher,
            builder,
        }
    }

    pub fn store(&self) -> &VersionStore<R> {
        &self.store
    }

    pub fn links(&self) -> &LinkManager<R> {
        &self.links
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Install `version`, rolling back if the process receives Ctrl-C.
    pub async fn install(&self, version: &PythonVersion, options: &InstallOptions) -> Result<Installed> {
        self.install_until(version, options, ctrl_c()).await
    }

    /// Install `version`, rolling back if `cancel` completes first.
    #[tracing::instrument(skip(self, options, cancel))]
    pub async fn install_until<C>(
        &self,
        version: &PythonVersion,
        options: &InstallOptions,
        cancel: C,
    ) -> Result<Installed>
    where
        C: Future<Output = ()>,
    {
        if self.store.is_installed(version) {
            if !options.reinstall {
                return Err(Error::AlreadyInstalled {
                    version: version.to_string(),
                });
            }
            info!("Reinstalling Python {}", version);
            self.remove(version)?;
        }

        let layout = self.store.layout();
        let workspace = layout.workspace(version, self.runtime.process_id());
        let scratch = cleanup::new_shared();
        cleanup::register(&scratch, workspace.clone());
        let published = AtomicBool::new(false);

        let result = tokio::select! {
            result = self.pipeline(version, options, &workspace, &scratch, &published) => result,
            _ = cancel => {
                eprintln!("\nInterrupted, cleaning up...");
                Err(Error::Interrupted)
            }
        };

        match result {
            // Another process completed the same version meanwhile; it is not ours to undo.
            Err(Error::AlreadyInstalled { .. }) => {}
            Err(ref e) => {
                self.transition(version, InstallState::Failed);
                debug!("Install of Python {} failed: {}", version, e);
                self.rollback(version, published.load(Ordering::SeqCst));
                self.transition(version, InstallState::Absent);
            }
            Ok(_) => {}
        }
        cleanup::cleanup_shared(&scratch, self.runtime.as_ref());
        result
    }

    async fn pipeline(
        &self,
        version: &PythonVersion,
        options: &InstallOptions,
        workspace: &Path,
        scratch: &SharedCleanupContext,
        published: &AtomicBool,
    ) -> Result<Installed> {
        if self.runtime.exists(workspace) {
            self.runtime.remove_dir_all(workspace)?;
        }
        self.runtime.create_dir_all(workspace)?;
        self.store.register(version)?;

        self.transition(version, InstallState::Fetching);
        println!("{:>12} Python {}", "fetching", version);
        let archive = self
            .fetcher
            .fetch(version, &workspace.join("download"))
            .await?;

        self.transition(version, InstallState::Building);
        println!("{:>12} Python {}", "building", version);
        let prefix = self
            .builder
            .build(version, &archive, workspace, &options.build, Arc::clone(scratch))
            .await?;

        self.transition(version, InstallState::Linking);
        let link = self.links.link_path(version);
        println!("{:>12} {}", "linking", link.display());
        self.links.publish(version, &prefix)?;
        published.store(true, Ordering::SeqCst);

        self.store.commit(version)?;
        self.transition(version, InstallState::Installed);
        println!("{:>12} Python {} ({})", "installed", version, link.display());

        Ok(Installed {
            version: *version,
            prefix,
            link,
        })
    }

    fn transition(&self, version: &PythonVersion, state: InstallState) {
        info!("Python {}: {}", version, state);
    }

    /// Undo a failed attempt. Errors are logged so every step gets its chance.
    fn rollback(&self, version: &PythonVersion, published: bool) {
        println!("{:>12} Python {}", "rolling back", version);
        if published && let Err(e) = self.links.retract(version) {
            warn!("Failed to retract link for Python {}: {}", version, e);
        }
        if let Err(e) = self.store.purge(version) {
            warn!("Failed to purge Python {}: {}", version, e);
        }
    }

    /// Retract the link of `version`, then purge it. No-op when it is not installed.
    ///
    /// Returns whether anything was removed. A foreign file holding the link
    /// name is left alone; the version is still purged and the collision is
    /// returned afterwards.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, version: &PythonVersion) -> Result<bool> {
        let layout = self.store.layout();
        let present = self.store.is_installed(version)
            || self.runtime.exists(&layout.prefix(version))
            || self.runtime.exists(&layout.pending_path(version));

        if !present {
            // A dangling link of ours may outlive its prefix; anything else is not ours to touch.
            match self.links.retract(version) {
                Ok(_) | Err(Error::NameCollision { .. }) => {}
                Err(e) => return Err(e),
            }
            debug!("Python {} is not installed, nothing to remove", version);
            return Ok(false);
        }

        let collision = match self.links.retract(version) {
            Ok(_) => None,
            Err(e @ Error::NameCollision { .. }) => Some(e),
            Err(e) => return Err(e),
        };
        self.store.purge(version)?;
        println!("{:>12} Python {}", "removed", version);
        match collision {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Remove every installed version, every stale failed install and
    /// whatever no install owns under the staging directory.
    ///
    /// All entries are attempted; failures are reported together.
    #[tracing::instrument(skip(self))]
    pub fn clean(&self) -> Result<CleanReport> {
        let mut versions: Vec<PythonVersion> = self
            .store
            .list()?
            .into_iter()
            .chain(self.store.pending()?)
            .map(|entry| entry.version)
            .collect();
        versions.sort();
        versions.dedup();

        let mut report = CleanReport::default();
        let mut failures = Vec::new();
        for version in versions {
            match self.remove(&version) {
                Ok(_) => report.removed.push(version),
                Err(e) => {
                    warn!("Failed to remove Python {}: {}", version, e);
                    failures.push((version.to_string(), e));
                }
            }
        }

        for path in self.store.stale_staging()? {
            let removed = if self.runtime.is_dir(&path) {
                self.runtime.remove_dir_all(&path)
            } else {
                self.runtime.remove_file(&path)
            };
            match removed {
                Ok(()) => {
                    debug!("Swept {:?}", path);
                    report.swept.push(path);
                }
                Err(e) => {
                    warn!("Failed to remove {:?}: {:#}", path, e);
                    failures.push((path.display().to_string(), e.into()));
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(Error::CleanFailed { failures })
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the signal handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MockBuilder;
    use crate::fetch::MockSourceFetcher;
    use crate::layout::Layout;
    use crate::runtime::RealRuntime;
    use crate::store::InstallStatus;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    type TestOrchestrator = Orchestrator<RealRuntime, MockSourceFetcher, MockBuilder>;

    fn v(s: &str) -> PythonVersion {
        s.parse().unwrap()
    }

    fn layout(dir: &TempDir) -> Layout {
        Layout::new(dir.path().join("root"), None)
    }

    fn orchestrator(layout: &Layout, fetcher: MockSourceFetcher, builder: MockBuilder) -> TestOrchestrator {
        let runtime = Arc::new(RealRuntime);
        let store = VersionStore::new(Arc::clone(&runtime), layout.clone());
        Orchestrator::new(runtime, store, fetcher, builder)
    }

    /// Fetcher that drops a placeholder archive into the scratch dir.
    fn fetcher_ok() -> MockSourceFetcher {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().returning(|version, scratch| {
            fs::create_dir_all(scratch).unwrap();
            let archive = scratch.join(version.archive_name());
            fs::write(&archive, [0x1f, 0x8b]).unwrap();
            Ok(archive)
        });
        fetcher
    }

    /// Builder that produces a prefix with an executable interpreter.
    fn builder_ok(layout: &Layout) -> MockBuilder {
        let layout = layout.clone();
        let mut builder = MockBuilder::new();
        builder
            .expect_build()
            .returning(move |version, _archive, workspace, _options, _cleanup| {
                assert!(workspace.starts_with(layout.staging_dir()));
                write_interpreter(&layout.interpreter(version), version);
                Ok(layout.prefix(version))
            });
        builder
    }

    fn write_interpreter(path: &Path, version: &PythonVersion) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("#!/bin/sh\necho Python {}\n", version)).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    fn build_failure() -> Error {
        Error::BuildFailed {
            step: "make".into(),
            status: "exit status 2".into(),
            output: "error: simulated".into(),
        }
    }

    fn staging_is_empty(layout: &Layout) -> bool {
        let staging = layout.staging_dir();
        !staging.exists() || fs::read_dir(staging).unwrap().next().is_none()
    }

    async fn install(o: &TestOrchestrator, version: &PythonVersion) -> Result<Installed> {
        o.install_until(version, &InstallOptions::default(), std::future::pending())
            .await
    }

    #[cfg(unix)]
    #[test_log::test(tokio::test)]
    async fn test_install_publishes_executable_link() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, fetcher_ok(), builder_ok(&layout));
        let version = v("3.8.2");

        let installed = install(&o, &version).await.unwrap();

        assert_eq!(installed.prefix, layout.prefix(&version));
        assert_eq!(installed.link, layout.bin_dir().join("altpy-python3.8.2"));
        assert!(o.store().is_installed(&version));
        let output = std::process::Command::new(&installed.link).output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Python 3.8.2");
        assert!(staging_is_empty(&layout));
        assert!(o.store().pending().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_then_remove_leaves_nothing() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, fetcher_ok(), builder_ok(&layout));
        let version = v("3.8.2");
        install(&o, &version).await.unwrap();

        assert!(o.remove(&version).unwrap());

        assert!(!o.store().is_installed(&version));
        assert!(!layout.prefix(&version).exists());
        assert!(fs::symlink_metadata(layout.link_path(&version)).is_err());
        assert!(o.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_never_installed_is_noop() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, MockSourceFetcher::new(), MockBuilder::new());

        assert!(!o.remove(&v("3.7.9")).unwrap());
        assert!(!layout.root().exists());
    }

    #[test]
    fn test_remove_never_installed_leaves_foreign_file() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, MockSourceFetcher::new(), MockBuilder::new());
        let version = v("3.7.9");
        fs::create_dir_all(layout.bin_dir()).unwrap();
        fs::write(layout.link_path(&version), "mine").unwrap();

        assert!(!o.remove(&version).unwrap());
        assert!(layout.link_path(&version).exists());
    }

    #[tokio::test]
    async fn test_install_already_installed_is_rejected() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, MockSourceFetcher::new(), MockBuilder::new());
        let version = v("3.8.2");
        o.store().register(&version).unwrap();
        fs::create_dir_all(layout.prefix(&version)).unwrap();
        o.store().commit(&version).unwrap();

        let err = install(&o, &version).await.unwrap_err();

        assert!(matches!(err, Error::AlreadyInstalled { .. }));
        assert!(o.store().is_installed(&version));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reinstall_rebuilds() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, fetcher_ok(), builder_ok(&layout));
        let version = v("3.8.2");
        install(&o, &version).await.unwrap();
        fs::write(layout.prefix(&version).join("marker"), "old").unwrap();

        let options = InstallOptions {
            reinstall: true,
            ..Default::default()
        };
        o.install_until(&version, &options, std::future::pending())
            .await
            .unwrap();

        assert!(o.store().is_installed(&version));
        assert!(!layout.prefix(&version).join("marker").exists());
        assert!(layout.link_path(&version).exists());
    }

    #[tokio::test]
    async fn test_build_failure_rolls_back() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let version = v("3.8.2");

        let mut builder = MockBuilder::new();
        let prefix = layout.prefix(&version);
        builder.expect_build().returning(move |_, _, workspace, _, _| {
            // Partial output in both the workspace and the prefix.
            fs::create_dir_all(workspace.join("src")).unwrap();
            fs::create_dir_all(prefix.join("lib")).unwrap();
            Err(build_failure())
        });
        let o = orchestrator(&layout, fetcher_ok(), builder);

        let err = install(&o, &version).await.unwrap_err();

        assert!(matches!(err, Error::BuildFailed { .. }));
        assert!(!o.store().is_installed(&version));
        assert!(!layout.prefix(&version).exists());
        assert!(o.store().pending().unwrap().is_empty());
        assert!(fs::symlink_metadata(layout.link_path(&version)).is_err());
        assert!(staging_is_empty(&layout));
    }

    #[tokio::test]
    async fn test_fetch_failure_rolls_back() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let version = v("9.9.9");

        let mut fetcher = MockSourceFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_, _| Err(Error::not_found("Python 9.9.9 source archive")));
        // No builder expectations: the build must not start.
        let o = orchestrator(&layout, fetcher, MockBuilder::new());

        let err = install(&o, &version).await.unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert!(o.store().list().unwrap().is_empty());
        assert!(o.store().pending().unwrap().is_empty());
        assert!(staging_is_empty(&layout));
    }

    #[tokio::test]
    async fn test_name_collision_rolls_back_without_touching_file() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let version = v("3.8.2");
        fs::create_dir_all(layout.bin_dir()).unwrap();
        fs::write(layout.link_path(&version), "user script").unwrap();
        let o = orchestrator(&layout, fetcher_ok(), builder_ok(&layout));

        let err = install(&o, &version).await.unwrap_err();

        assert!(matches!(err, Error::NameCollision { .. }));
        assert_eq!(
            fs::read_to_string(layout.link_path(&version)).unwrap(),
            "user script"
        );
        assert!(!layout.prefix(&version).exists());
    }

    /// Builder that leaves partial output behind and then never finishes.
    struct StallingBuilder {
        layout: Layout,
    }

    #[async_trait::async_trait]
    impl Builder for StallingBuilder {
        async fn build(
            &self,
            version: &PythonVersion,
            _archive: &Path,
            workspace: &Path,
            _options: &BuildOptions,
            _cleanup: SharedCleanupContext,
        ) -> Result<PathBuf> {
            fs::create_dir_all(workspace.join("src")).unwrap();
            fs::create_dir_all(self.layout.prefix(version).join("bin")).unwrap();
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancellation_rolls_back() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let version = v("3.8.2");
        let runtime = Arc::new(RealRuntime);
        let store = VersionStore::new(Arc::clone(&runtime), layout.clone());
        let builder = StallingBuilder {
            layout: layout.clone(),
        };
        let o = Orchestrator::new(runtime, store, fetcher_ok(), builder);

        let err = o
            .install_until(
                &version,
                &InstallOptions::default(),
                tokio::time::sleep(std::time::Duration::from_millis(50)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Interrupted));
        assert_eq!(err.kind().exit_code(), 130);
        assert!(!layout.prefix(&version).exists());
        assert!(!o.store().is_installed(&version));
        assert!(o.store().pending().unwrap().is_empty());
        assert!(staging_is_empty(&layout));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_installs_use_separate_workspaces() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);

        let mut builder = MockBuilder::new();
        let build_layout = layout.clone();
        builder
            .expect_build()
            .times(2)
            .returning(move |version, archive, workspace, _, _| {
                // Each attempt sees only its own archive in its own workspace.
                assert!(archive.starts_with(workspace));
                assert!(
                    workspace
                        .file_name()
                        .unwrap()
                        .to_string_lossy()
                        .starts_with(&format!("{}.", version))
                );
                let entries: Vec<_> = fs::read_dir(workspace.join("download"))
                    .unwrap()
                    .map(|e| e.unwrap().file_name())
                    .collect();
                assert_eq!(entries, vec![std::ffi::OsString::from(version.archive_name())]);
                write_interpreter(&build_layout.interpreter(version), version);
                Ok(build_layout.prefix(version))
            });
        let o = orchestrator(&layout, fetcher_ok(), builder);
        let (a, b) = (v("3.8.2"), v("3.9.0"));

        let (ra, rb) = tokio::join!(install(&o, &a), install(&o, &b));

        ra.unwrap();
        rb.unwrap();
        let listed: Vec<_> = o.store().list().unwrap().into_iter().map(|e| e.version).collect();
        assert_eq!(listed, vec![a, b]);
        assert!(layout.link_path(&a).exists());
        assert!(layout.link_path(&b).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_of_one_version_leaves_other_intact() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);

        let mut builder = MockBuilder::new();
        let build_layout = layout.clone();
        builder.expect_build().returning(move |version, _, _, _, _| {
            if version.minor == 9 {
                return Err(build_failure());
            }
            write_interpreter(&build_layout.interpreter(version), version);
            Ok(build_layout.prefix(version))
        });
        let o = orchestrator(&layout, fetcher_ok(), builder);
        let (good, bad) = (v("3.8.2"), v("3.9.0"));

        let (rg, rb) = tokio::join!(install(&o, &good), install(&o, &bad));

        rg.unwrap();
        assert!(matches!(rb.unwrap_err(), Error::BuildFailed { .. }));
        assert!(o.store().is_installed(&good));
        assert!(layout.link_path(&good).exists());
        assert!(!layout.prefix(&bad).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_removes_everything() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, fetcher_ok(), builder_ok(&layout));
        for s in ["3.8.2", "3.9.0"] {
            install(&o, &v(s)).await.unwrap();
        }
        // A stale record from a crashed run is cleaned too.
        o.store().register(&v("3.7.9")).unwrap();

        let report = o.clean().unwrap();

        assert_eq!(report.removed, vec![v("3.7.9"), v("3.8.2"), v("3.9.0")]);
        assert!(o.store().list().unwrap().is_empty());
        assert!(o.store().pending().unwrap().is_empty());
        assert!(fs::read_dir(layout.bin_dir()).unwrap().next().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_reports_failures_after_trying_all() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, fetcher_ok(), builder_ok(&layout));
        for s in ["3.8.2", "3.9.0"] {
            install(&o, &v(s)).await.unwrap();
        }
        // Replace one link with a file altpy does not own.
        let foreign = layout.link_path(&v("3.8.2"));
        fs::remove_file(&foreign).unwrap();
        fs::write(&foreign, "user script").unwrap();

        let err = o.clean().unwrap_err();

        match err {
            Error::CleanFailed { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "3.8.2");
                assert!(matches!(failures[0].1, Error::NameCollision { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Both versions are gone even though one removal reported a failure.
        assert!(o.store().list().unwrap().is_empty());
        assert!(!layout.prefix(&v("3.8.2")).exists());
        assert_eq!(fs::read_to_string(&foreign).unwrap(), "user script");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remove_purges_despite_foreign_link_name() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, fetcher_ok(), builder_ok(&layout));
        let version = v("3.8.2");
        install(&o, &version).await.unwrap();
        let link = layout.link_path(&version);
        fs::remove_file(&link).unwrap();
        fs::write(&link, "user script").unwrap();

        let err = o.remove(&version).unwrap_err();

        assert!(matches!(err, Error::NameCollision { .. }));
        assert!(!o.store().is_installed(&version));
        assert!(!layout.prefix(&version).exists());
        assert_eq!(fs::read_to_string(&link).unwrap(), "user script");
    }

    #[test]
    fn test_clean_sweeps_abandoned_staging() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, MockSourceFetcher::new(), MockBuilder::new());
        let staging = layout.staging_dir();
        // Workspace of a killed run and trash of a purge whose delete failed.
        let killed = staging.join("3.8.2.999999");
        fs::create_dir_all(killed.join("src").join("Objects")).unwrap();
        fs::write(killed.join("src").join("Objects").join("obj.o"), "").unwrap();
        let trash = staging.join("3.9.0.12.removed");
        fs::create_dir_all(trash.join("bin")).unwrap();

        let report = o.clean().unwrap();

        assert!(report.removed.is_empty());
        assert_eq!(report.swept, vec![killed.clone(), trash.clone()]);
        assert!(!killed.exists());
        assert!(!trash.exists());
        assert!(staging_is_empty(&layout));
    }

    #[test]
    fn test_clean_with_nothing_installed() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let o = orchestrator(&layout, MockSourceFetcher::new(), MockBuilder::new());

        assert_eq!(o.clean().unwrap(), CleanReport::default());
    }

    #[test]
    fn test_install_state_display() {
        assert_eq!(InstallState::Fetching.to_string(), "fetching");
        assert_eq!(InstallState::Installed.to_string(), "installed");
        assert_ne!(InstallStatus::Failed, InstallStatus::Complete);
    }
}
