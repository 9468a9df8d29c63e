//! Registry of installed versions, persisted as directories under the installs root.
//!
//! A version is installed iff its prefix directory holds a receipt written by
//! [`VersionStore::commit`]. In-progress installs are tracked by a pending
//! record next to the prefixes; a prefix without a receipt is never trusted.

use anyhow::Context;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::runtime::Runtime;
use crate::version::PythonVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallStatus {
    InProgress,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVersion {
    pub version: PythonVersion,
    pub prefix: PathBuf,
    /// Unix timestamp (seconds) of the install start, carried over on commit.
    pub installed_at: u64,
    pub status: InstallStatus,
}

pub struct VersionStore<R: Runtime> {
    runtime: Arc<R>,
    layout: Layout,
}

impl<R: Runtime> Clone for VersionStore<R> {
    fn clone(&self) -> Self {
        Self {
            runtime: Arc::clone(&self.runtime),
            layout: self.layout.clone(),
        }
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl<R: Runtime> VersionStore<R> {
    pub fn new(runtime: Arc<R>, layout: Layout) -> Self {
        Self { runtime, layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_installed(&self, version: &PythonVersion) -> bool {
        matches!(
            self.get(version),
            Some(InstalledVersion {
                status: InstallStatus::Complete,
                ..
            })
        )
    }

    /// Complete entry for `version`, if any.
    pub fn get(&self, version: &PythonVersion) -> Option<InstalledVersion> {
        let receipt = self.layout.receipt_path(version);
        if !self.runtime.exists(&receipt) {
            return None;
        }
        match self.read_record(&receipt) {
            Ok(entry) if entry.version == *version && entry.status == InstallStatus::Complete => {
                Some(entry)
            }
            Ok(entry) => {
                warn!("Ignoring receipt {:?} with unexpected contents: {:?}", receipt, entry);
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable receipt {:?}: {:#}", receipt, e);
                None
            }
        }
    }

    /// Mark `version` as being installed.
    ///
    /// Overwrites any earlier in-progress record and discards an unreceipted
    /// prefix left behind by a crashed run.
    #[tracing::instrument(skip(self))]
    pub fn register(&self, version: &PythonVersion) -> Result<InstalledVersion> {
        let prefix = self.layout.prefix(version);
        if self.runtime.exists(&prefix) && !self.is_installed(version) {
            debug!("Discarding stale prefix {:?}", prefix);
            self.discard(version, &prefix)?;
        }

        let entry = InstalledVersion {
            version: *version,
            prefix,
            installed_at: now(),
            status: InstallStatus::InProgress,
        };
        self.runtime.create_dir_all(&self.layout.pending_dir())?;
        self.write_record(&self.layout.pending_path(version), &entry)?;
        Ok(entry)
    }

    /// Promote the in-progress entry of `version` to complete.
    #[tracing::instrument(skip(self))]
    pub fn commit(&self, version: &PythonVersion) -> Result<InstalledVersion> {
        let pending_path = self.layout.pending_path(version);
        let pending = if self.runtime.exists(&pending_path) {
            self.read_record(&pending_path).ok()
        } else {
            None
        };
        let Some(pending) = pending.filter(|p| p.status == InstallStatus::InProgress) else {
            return Err(Error::not_found(format!(
                "in-progress install of Python {}",
                version
            )));
        };
        if !self.runtime.is_dir(&pending.prefix) {
            return Err(Error::not_found(format!("prefix {:?}", pending.prefix)));
        }

        let entry = InstalledVersion {
            status: InstallStatus::Complete,
            ..pending
        };
        self.write_record(&self.layout.receipt_path(version), &entry)?;
        self.runtime.remove_file(&pending_path)?;
        Ok(entry)
    }

    /// Remove `version` and delete its prefix. No-op if it was never installed.
    ///
    /// The prefix is renamed out of the installs root before it is deleted,
    /// so the entry is gone even if the recursive delete fails halfway.
    #[tracing::instrument(skip(self))]
    pub fn purge(&self, version: &PythonVersion) -> Result<()> {
        let pending_path = self.layout.pending_path(version);
        if self.runtime.exists(&pending_path) {
            self.runtime.remove_file(&pending_path)?;
        }

        let prefix = self.layout.prefix(version);
        if !self.runtime.exists(&prefix) {
            debug!("Python {} is not installed, nothing to purge", version);
            return Ok(());
        }
        self.discard(version, &prefix)
    }

    /// All complete entries, sorted by version.
    pub fn list(&self) -> Result<Vec<InstalledVersion>> {
        let mut entries: Vec<InstalledVersion> = self
            .versions_on_disk()?
            .iter()
            .filter_map(|v| self.get(v))
            .collect();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    /// Installs that were started but never completed, reported as failed.
    pub fn pending(&self) -> Result<Vec<InstalledVersion>> {
        let dir = self.layout.pending_dir();
        if !self.runtime.is_dir(&dir) {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for path in self.runtime.read_dir(&dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path) {
                Ok(entry) => entries.push(InstalledVersion {
                    status: InstallStatus::Failed,
                    ..entry
                }),
                Err(e) => debug!("Skipping unreadable pending record {:?}: {:#}", path, e),
            }
        }
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    /// Staging entries no install attempt owns any more.
    ///
    /// That is trash left by an interrupted [`purge`](Self::purge) and
    /// workspaces of versions that have no in-progress record.
    pub fn stale_staging(&self) -> Result<Vec<PathBuf>> {
        let staging = self.layout.staging_dir();
        if !self.runtime.is_dir(&staging) {
            return Ok(Vec::new());
        }
        let mut stale = Vec::new();
        for path in self.runtime.read_dir(&staging)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".removed") {
                stale.push(path);
            } else if let Some(version) = workspace_version(name)
                && !self.runtime.exists(&self.layout.pending_path(&version))
            {
                stale.push(path);
            }
        }
        stale.sort();
        Ok(stale)
    }

    fn versions_on_disk(&self) -> Result<Vec<PythonVersion>> {
        let installs = self.layout.installs_dir();
        if !self.runtime.is_dir(&installs) {
            return Ok(Vec::new());
        }
        Ok(self
            .runtime
            .read_dir(&installs)?
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.parse().ok())
            .collect())
    }

    fn discard(&self, version: &PythonVersion, prefix: &std::path::Path) -> Result<()> {
        let staging = self.layout.staging_dir();
        self.runtime.create_dir_all(&staging)?;
        let trash = staging.join(format!(
            "{}.{}.removed",
            version,
            self.runtime.process_id()
        ));
        if self.runtime.exists(&trash) {
            self.runtime.remove_dir_all(&trash)?;
        }
        self.runtime
            .rename(prefix, &trash)
            .with_context(|| format!("Failed to remove Python {}", version))?;
        self.runtime.remove_dir_all(&trash)?;
        Ok(())
    }

    fn read_record(&self, path: &std::path::Path) -> Result<InstalledVersion> {
        let content = self.runtime.read_to_string(path)?;
        let entry = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(entry)
    }

    /// Write via a temporary file and rename, so readers never see a partial record.
    fn write_record(&self, path: &std::path::Path, entry: &InstalledVersion) -> Result<()> {
        let json = serde_json::to_string_pretty(entry).context("Failed to serialize record")?;
        let tmp = path.with_extension(format!("tmp.{}", self.runtime.process_id()));
        self.runtime.write(&tmp, json.as_bytes())?;
        self.runtime.rename(&tmp, path)?;
        Ok(())
    }
}

/// Version of a `<version>.<pid>` workspace name.
fn workspace_version(name: &str) -> Option<PythonVersion> {
    let (version, pid) = name.rsplit_once('.')?;
    pid.parse::<u32>().ok()?;
    version.parse().ok()
}
