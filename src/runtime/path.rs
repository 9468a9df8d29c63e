//! Path utility functions for normalization and comparison.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
/// Returns true if `path` is under `dir` (i.e., `dir` is a prefix of `path`).
///
/// `/opt/altpy/installs/../../../etc/passwd` is NOT under `/opt/altpy/installs`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Re-root an absolute path under `base`, the way `make DESTDIR=<base>` does.
///
/// `rebase_under("/tmp/image", "/home/u/.altpy/installs/3.8.2")` is
/// `/tmp/image/home/u/.altpy/installs/3.8.2`.
pub fn rebase_under(base: &Path, absolute: &Path) -> PathBuf {
    let mut result = base.to_path_buf();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            other => result.push(other),
        }
    }
    result
}

/// Calculate the relative path from a symlink location to a target.
///
/// For a link at `/home/u/.altpy/bin/altpy-python3.8.2` pointing to
/// `/home/u/.altpy/installs/3.8.2/bin/python3.8`, this returns
/// `../installs/3.8.2/bin/python3.8`.
///
/// Returns `None` if a relative path cannot be computed (e.g., different drive letters on Windows).
pub fn relative_symlink_path(from_link: &Path, to_target: &Path) -> Option<PathBuf> {
    let from_dir = from_link.parent()?;
    let result = pathdiff::diff_paths(to_target, from_dir)?;
    if result.is_absolute() {
        return None;
    }
    Some(result)
}
