use crate::runtime::Runtime;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Paths an install attempt has created and must delete once it concludes.
#[derive(Debug, Default)]
pub struct CleanupContext {
    #[cfg(test)]
    pub paths: Vec<PathBuf>,
    #[cfg(not(test))]
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Forget a path, e.g. once it has been promoted or deleted normally.
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    /// Delete every registered path, newest first. Failures are logged, not raised.
    pub fn cleanup<R: Runtime + ?Sized>(&mut self, runtime: &R) {
        while let Some(path) = self.paths.pop() {
            debug!("Cleaning up: {:?}", path);
            let result = if runtime.is_dir(&path) && !runtime.is_symlink(&path) {
                runtime.remove_dir_all(&path)
            } else if runtime.exists(&path) || runtime.is_symlink(&path) {
                runtime.remove_file(&path)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                warn!("Failed to clean up {:?}: {:#}", path, e);
            }
        }
    }
}

pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Register `path` with a shared context, tolerating a poisoned lock.
pub fn register(ctx: &SharedCleanupContext, path: PathBuf) {
    let mut guard = match ctx.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.add(path);
}

/// Run [`CleanupContext::cleanup`] on a shared context, tolerating a poisoned lock.
pub fn cleanup_shared<R: Runtime + ?Sized>(ctx: &SharedCleanupContext, runtime: &R) {
    let mut guard = match ctx.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.cleanup(runtime);
}
