use crate::cleanup::SharedCleanupContext;
use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::{Component, Path, PathBuf};
use tar::EntryType;

/// Extractor for gzip-compressed tarballs such as `Python-3.8.2.tgz`.
pub struct TarGzExtractor;

impl TarGzExtractor {
    pub fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    /// Unpack `archive_path` so that `extract_to` becomes the source tree root.
    ///
    /// A single top-level directory (`Python-X.Y.Z/`) is stripped. `extract_to`
    /// must not exist yet.
    #[tracing::instrument(skip(self, runtime, cleanup_ctx))]
    pub fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: Option<SharedCleanupContext>,
    ) -> Result<()> {
        if !self.can_handle(archive_path) {
            bail!("Unsupported archive format: {}", archive_path.display());
        }
        if runtime.exists(extract_to) {
            bail!("Extraction target {:?} already exists", extract_to);
        }

        let temp_extract_dir = temp_dir_for(extract_to)?;
        if runtime.exists(&temp_extract_dir) {
            runtime.remove_dir_all(&temp_extract_dir)?;
        }
        runtime.create_dir_all(&temp_extract_dir)?;
        if let Some(ref ctx) = cleanup_ctx {
            ctx.lock()
                .map_err(|_| anyhow!("cleanup context poisoned"))?
                .add(temp_extract_dir.clone());
        }

        debug!("Unpacking {:?} to {:?}", archive_path, temp_extract_dir);
        let result = self
            .unpack_entries(runtime, archive_path, &temp_extract_dir)
            .and_then(|count| {
                if count == 0 {
                    bail!("Archive {:?} appears to be empty", archive_path);
                }
                self.promote(runtime, &temp_extract_dir, extract_to)
            });

        if runtime.exists(&temp_extract_dir) {
            runtime.remove_dir_all(&temp_extract_dir)?;
        }
        if let Some(ref ctx) = cleanup_ctx
            && let Ok(mut guard) = ctx.lock()
        {
            guard.remove(&temp_extract_dir);
        }

        result?;
        info!("Extraction complete.");
        Ok(())
    }

    fn unpack_entries<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        archive_path: &Path,
        dest: &Path,
    ) -> Result<usize> {
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let mut count = 0;

        for entry in archive
            .entries()
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?
        {
            let mut entry = entry.context("Failed to read tar entry")?;
            let entry_path = entry.path().context("Invalid tar entry path")?.into_owned();
            let Some(relative) = enclosed_name(&entry_path) else {
                debug!("Skipping entry with unsafe path {:?}", entry_path);
                continue;
            };
            let full_path = dest.join(&relative);

            match entry.header().entry_type() {
                EntryType::Directory => runtime.create_dir_all(&full_path)?,
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest_file);

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                EntryType::Symlink => {
                    let Some(target) = entry.link_name().context("Invalid symlink target")? else {
                        continue;
                    };
                    let target = target.into_owned();
                    if !stays_inside(&relative, &target) {
                        debug!("Skipping symlink {:?} escaping the tree", entry_path);
                        continue;
                    }
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    runtime.symlink(&target, &full_path)?;
                }
                other => {
                    debug!("Skipping {:?} entry {:?}", other, entry_path);
                    continue;
                }
            }
            count += 1;
        }

        Ok(count)
    }

    /// Move the unpacked tree to `extract_to`, dropping a lone top-level directory.
    fn promote<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        temp_extract_dir: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        let entries = runtime
            .read_dir(temp_extract_dir)
            .context("Failed to read temp extraction directory")?;

        let source_dir = match entries.as_slice() {
            [only] if runtime.is_dir(only) && !runtime.is_symlink(only) => only.clone(),
            _ => temp_extract_dir.to_path_buf(),
        };

        if let Some(parent) = extract_to.parent() {
            runtime.create_dir_all(parent)?;
        }
        debug!("Moving {:?} to {:?}", source_dir, extract_to);
        runtime.rename(&source_dir, extract_to)
    }
}

fn temp_dir_for(extract_to: &Path) -> Result<PathBuf> {
    let name = extract_to
        .file_name()
        .ok_or_else(|| anyhow!("Invalid extraction target {:?}", extract_to))?;
    Ok(extract_to.with_file_name(format!("{}_temp_extract", name.to_string_lossy())))
}

/// Relative path of an archive member, or None if it is absolute or climbs out.
fn enclosed_name(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

/// True if a symlink at `link` (relative to the tree root) pointing at `target` resolves inside the tree.
fn stays_inside(link: &Path, target: &Path) -> bool {
    if target.is_absolute() {
        return false;
    }
    let mut depth: usize = link.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}
