use log::debug;

use crate::error::Result;
use crate::runtime::Runtime;

use super::config::Config;
use super::parse_version;

/// Remove one installed version and its link.
#[tracing::instrument(skip(config))]
pub fn remove<R: Runtime + 'static>(config: &Config<R>, version: &str, yes: bool) -> Result<()> {
    let version = parse_version(version)?;
    let store = config.store();

    if store.is_installed(&version) && !yes {
        println!("Will remove Python {}:", version);
        println!("  {}", config.layout.prefix(&version).display());
        println!("  {}", config.layout.link_path(&version).display());
        if !config.runtime.confirm("Proceed with removal?")? {
            println!("Removal cancelled.");
            return Ok(());
        }
    }

    if !config.orchestrator(false).remove(&version)? {
        println!("Python {} is not installed.", version);
    }
    Ok(())
}

/// Remove every installed version.
#[tracing::instrument(skip(config))]
pub fn clean<R: Runtime + 'static>(config: &Config<R>, yes: bool) -> Result<()> {
    let store = config.store();
    let installed = store.list()?;
    let pending = store.pending()?;
    let stale = store.stale_staging()?;
    if installed.is_empty() && pending.is_empty() && stale.is_empty() {
        println!("Nothing to clean.");
        return Ok(());
    }
    debug!(
        "Cleaning {} installed and {} failed version(s), {} leftover staging entries",
        installed.len(),
        pending.len(),
        stale.len()
    );

    if !yes {
        println!("Will remove:");
        for entry in installed.iter().chain(pending.iter()) {
            println!("  Python {} ({})", entry.version, entry.prefix.display());
        }
        for path in &stale {
            println!("  {}", path.display());
        }
        if !config.runtime.confirm("Proceed with removal?")? {
            println!("Clean cancelled.");
            return Ok(());
        }
    }

    let report = config.orchestrator(false).clean()?;
    println!("Removed {} version(s).", report.removed.len());
    if !report.swept.is_empty() {
        println!("Removed {} leftover build file(s).", report.swept.len());
    }
    Ok(())
}
