//! Versioned executable names in the bin directory.
//!
//! Every installed version gets exactly one link, `altpy-python<version>`,
//! pointing at its interpreter. Names are derived from the version alone, so
//! they never shadow `python`, `python3` or another version's link.

use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::runtime::path::{normalize_path, relative_symlink_path};
use crate::runtime::Runtime;
use crate::version::PythonVersion;

pub struct LinkManager<R: Runtime> {
    runtime: Arc<R>,
    layout: Layout,
}

impl<R: Runtime> LinkManager<R> {
    pub fn new(runtime: Arc<R>, layout: Layout) -> Self {
        Self { runtime, layout }
    }

    pub fn link_path(&self, version: &PythonVersion) -> PathBuf {
        self.layout.link_path(version)
    }

    /// Make `altpy-python<version>` point at the interpreter inside `prefix`.
    ///
    /// Returns `true` if the link was created and `false` if it already pointed
    /// there. Any other file with that name is a [`Error::NameCollision`].
    #[tracing::instrument(skip(self))]
    pub fn publish(&self, version: &PythonVersion, prefix: &Path) -> Result<bool> {
        let link = self.link_path(version);
        let target = prefix.join("bin").join(version.interpreter_name());

        if self.runtime.is_symlink(&link) {
            let current = self.runtime.resolve_link(&link)?;
            if normalize_path(&current) == normalize_path(&target) {
                debug!("{:?} already points to {:?}", link, target);
                return Ok(false);
            }
            return Err(self.collision(version, link));
        }
        if self.runtime.exists(&link) {
            return Err(self.collision(version, link));
        }

        let bin_dir = self.layout.bin_dir();
        self.runtime.create_dir_all(bin_dir)?;

        let link_target = relative_symlink_path(&link, &target).unwrap_or_else(|| target.clone());
        let temp_link = bin_dir.join(format!(
            ".{}.{}.tmp",
            version.link_name(),
            self.runtime.process_id()
        ));
        if self.runtime.is_symlink(&temp_link) {
            self.runtime.remove_symlink(&temp_link)?;
        }

        debug!("Linking {:?} -> {:?}", link, link_target);
        self.runtime.symlink(&link_target, &temp_link)?;
        if let Err(e) = self.runtime.rename(&temp_link, &link) {
            let _ = self.runtime.remove_symlink(&temp_link);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Remove the link of `version` if it points into the installs root.
    ///
    /// Returns `false` when there was nothing to remove. A file with that name
    /// that altpy does not own is left in place and reported as a collision.
    #[tracing::instrument(skip(self))]
    pub fn retract(&self, version: &PythonVersion) -> Result<bool> {
        let link = self.link_path(version);
        let is_symlink = self.runtime.is_symlink(&link);
        if !is_symlink && !self.runtime.exists(&link) {
            debug!("{:?} does not exist, nothing to retract", link);
            return Ok(false);
        }
        if !is_symlink {
            return Err(self.collision(version, link));
        }

        if self
            .runtime
            .remove_symlink_if_target_under(&link, &self.layout.installs_dir())?
        {
            Ok(true)
        } else {
            Err(self.collision(version, link))
        }
    }

    /// Current target of the link of `version`, if it exists.
    pub fn target(&self, version: &PythonVersion) -> Option<PathBuf> {
        let link = self.link_path(version);
        if !self.runtime.is_symlink(&link) {
            return None;
        }
        self.runtime.resolve_link(&link).ok()
    }

    fn collision(&self, version: &PythonVersion, path: PathBuf) -> Error {
        Error::NameCollision {
            name: version.link_name(),
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::test_root;
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, Layout, LinkManager<RealRuntime>) {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("root"), None);
        let manager = LinkManager::new(Arc::new(RealRuntime), layout.clone());
        (dir, layout, manager)
    }

    fn fake_prefix(layout: &Layout, version: &PythonVersion) -> PathBuf {
        let interpreter = layout.interpreter(version);
        fs::create_dir_all(interpreter.parent().unwrap()).unwrap();
        fs::write(&interpreter, "#!/bin/sh\n").unwrap();
        layout.prefix(version)
    }

    #[test]
    fn test_link_name_is_version_qualified() {
        let (_dir, layout, manager) = setup();
        let link = manager.link_path(&PythonVersion::new(3, 8, 2));
        assert_eq!(link.parent(), Some(layout.bin_dir()));
        let name = link.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "altpy-python3.8.2");
        for system in ["python", "python3", "python3.8"] {
            assert_ne!(name, system);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_publish_creates_relative_link() {
        let (_dir, layout, manager) = setup();
        let version = PythonVersion::new(3, 8, 2);
        let prefix = fake_prefix(&layout, &version);

        assert!(manager.publish(&version, &prefix).unwrap());

        let link = layout.bin_dir().join("altpy-python3.8.2");
        assert_eq!(
            fs::read_link(&link).unwrap(),
            PathBuf::from("../installs/3.8.2/bin/python3.8")
        );
        assert_eq!(manager.target(&version), Some(layout.interpreter(&version)));
        // No temporary link left behind.
        assert_eq!(fs::read_dir(layout.bin_dir()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_publish_is_idempotent() {
        let (_dir, layout, manager) = setup();
        let version = PythonVersion::new(3, 8, 2);
        let prefix = fake_prefix(&layout, &version);

        assert!(manager.publish(&version, &prefix).unwrap());
        assert!(!manager.publish(&version, &prefix).unwrap());
    }

    #[test]
    fn test_publish_refuses_regular_file() {
        let (_dir, layout, manager) = setup();
        let version = PythonVersion::new(3, 8, 2);
        let prefix = fake_prefix(&layout, &version);
        fs::create_dir_all(layout.bin_dir()).unwrap();
        let link = layout.link_path(&version);
        fs::write(&link, "user script").unwrap();

        let err = manager.publish(&version, &prefix).unwrap_err();

        assert!(matches!(err, Error::NameCollision { ref path, .. } if *path == link));
        assert_eq!(fs::read_to_string(&link).unwrap(), "user script");
    }

    #[cfg(unix)]
    #[test]
    fn test_publish_refuses_foreign_symlink() {
        let (dir, layout, manager) = setup();
        let version = PythonVersion::new(3, 8, 2);
        let prefix = fake_prefix(&layout, &version);
        fs::create_dir_all(layout.bin_dir()).unwrap();
        let elsewhere = dir.path().join("elsewhere");
        fs::write(&elsewhere, "").unwrap();
        std::os::unix::fs::symlink(&elsewhere, layout.link_path(&version)).unwrap();

        let err = manager.publish(&version, &prefix).unwrap_err();
        assert!(matches!(err, Error::NameCollision { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_retract_removes_own_link() {
        let (_dir, layout, manager) = setup();
        let version = PythonVersion::new(3, 8, 2);
        let prefix = fake_prefix(&layout, &version);
        manager.publish(&version, &prefix).unwrap();

        assert!(manager.retract(&version).unwrap());
        assert!(!layout.link_path(&version).exists());
        assert!(layout.interpreter(&version).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_retract_removes_dangling_own_link() {
        let (_dir, layout, manager) = setup();
        let version = PythonVersion::new(3, 8, 2);
        let prefix = fake_prefix(&layout, &version);
        manager.publish(&version, &prefix).unwrap();
        fs::remove_dir_all(&prefix).unwrap();

        assert!(manager.retract(&version).unwrap());
        assert!(fs::symlink_metadata(layout.link_path(&version)).is_err());
    }

    #[test]
    fn test_retract_absent_is_noop() {
        let (_dir, _layout, manager) = setup();
        assert!(!manager.retract(&PythonVersion::new(3, 8, 2)).unwrap());
    }

    #[test]
    fn test_retract_leaves_foreign_file() {
        let (_dir, layout, manager) = setup();
        let version = PythonVersion::new(3, 8, 2);
        fs::create_dir_all(layout.bin_dir()).unwrap();
        let link = layout.link_path(&version);
        fs::write(&link, "user script").unwrap();

        let err = manager.retract(&version).unwrap_err();

        assert!(matches!(err, Error::NameCollision { .. }));
        assert!(link.exists());
    }

    #[test]
    fn test_retract_checks_target_under_installs_dir() {
        let layout = Layout::new(test_root(), None);
        let version = PythonVersion::new(3, 9, 0);
        let link = layout.link_path(&version);

        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_symlink()
            .with(eq(link.clone()))
            .returning(|_| true);
        runtime
            .expect_remove_symlink_if_target_under()
            .with(eq(link.clone()), eq(test_root().join("installs")))
            .times(1)
            .returning(|_, _| Ok(true));

        let manager = LinkManager::new(Arc::new(runtime), layout);
        assert!(manager.retract(&version).unwrap());
    }
}
