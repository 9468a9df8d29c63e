//! Symlink operations (create, read, resolve, remove).

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;
use super::path::{is_path_under, normalize_path};

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn symlink_impl(&self, original: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink as unix_symlink;
            unix_symlink(original, link)
                .with_context(|| format!("Failed to create symlink {:?} -> {:?}", link, original))?;
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::symlink_file;
            symlink_file(original, link)
                .with_context(|| format!("Failed to create symlink {:?} -> {:?}", link, original))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn resolve_link_impl(&self, path: &Path) -> Result<PathBuf> {
        let target = fs::read_link(path).context("Failed to read symlink")?;
        if target.is_absolute() {
            Ok(target)
        } else {
            let parent = path
                .parent()
                .context("Failed to get parent directory of symlink")?;
            Ok(normalize_path(&parent.join(&target)))
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_symlink_impl(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_symlink_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Failed to remove symlink {:?}", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_symlink_if_target_under_impl(
        &self,
        link_path: &Path,
        target_prefix: &Path,
    ) -> Result<bool> {
        debug!(
            "Validating link {:?} (expected prefix: {:?})",
            link_path, target_prefix
        );

        if !self.is_symlink_impl(link_path) {
            if fs::symlink_metadata(link_path).is_ok() {
                warn!("{:?} exists but is not a symlink, skipping", link_path);
            } else {
                debug!("{:?} does not exist, skipping", link_path);
            }
            return Ok(false);
        }

        let target = self.resolve_link_impl(link_path)?;
        // The target may already be gone (dangling link), so only the prefix is canonicalized.
        let canonical_prefix =
            fs::canonicalize(target_prefix).unwrap_or_else(|_| target_prefix.to_path_buf());
        let canonical_target = fs::canonicalize(&target).unwrap_or_else(|_| target.clone());

        if !is_path_under(&target, target_prefix) && !is_path_under(&canonical_target, &canonical_prefix)
        {
            warn!(
                "{:?} points to {:?} which is not within {:?}, skipping removal",
                link_path, target, target_prefix
            );
            return Ok(false);
        }

        debug!("Removing link {:?}", link_path);
        self.remove_symlink_impl(link_path)?;
        Ok(true)
    }
}
