use std::sync::Arc;

use crate::error::Result;
use crate::link::LinkManager;
use crate::runtime::Runtime;
use crate::store::InstallStatus;

use super::config::Config;

/// Print installed versions with their links; `all` adds failed installs.
#[tracing::instrument(skip(config))]
pub fn list<R: Runtime + 'static>(config: &Config<R>, all: bool) -> Result<()> {
    let store = config.store();
    let mut entries = store.list()?;
    if all {
        entries.extend(store.pending()?);
        entries.sort_by_key(|e| e.version);
    }

    if entries.is_empty() {
        println!("No Python versions installed.");
        return Ok(());
    }

    let links = LinkManager::new(Arc::clone(&config.runtime), config.layout.clone());
    for entry in entries {
        match entry.status {
            InstallStatus::Complete => {
                let link = links.link_path(&entry.version);
                match links.target(&entry.version) {
                    Some(target) => println!(
                        "{}  {} -> {}",
                        entry.version,
                        link.display(),
                        target.display()
                    ),
                    None => println!("{}  {} (link missing)", entry.version, link.display()),
                }
            }
            InstallStatus::InProgress | InstallStatus::Failed => {
                println!("{}  (failed, run `altpy remove {}`)", entry.version, entry.version);
            }
        }
    }
    Ok(())
}

/// Print the versions published upstream, marking installed ones.
#[tracing::instrument(skip(config))]
pub async fn available<R: Runtime + 'static>(config: &Config<R>) -> Result<()> {
    use crate::fetch::SourceFetcher;

    let store = config.store();
    for version in config.fetcher().available_versions().await? {
        let marker = if store.is_installed(&version) { "*" } else { " " };
        println!("{} {}", marker, version);
    }
    Ok(())
}
