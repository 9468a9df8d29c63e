use log::debug;

use crate::error::Result;
use crate::orchestrator::InstallOptions;
use crate::runtime::Runtime;

use super::config::Config;
use super::parse_version;

/// An `altpy install` invocation after argument parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRequest {
    pub version: String,
    pub options: InstallOptions,
    /// Skip the reinstall confirmation.
    pub yes: bool,
}

/// Build and link one Python version.
#[tracing::instrument(skip(config))]
pub async fn install<R: Runtime + 'static>(config: &Config<R>, request: InstallRequest) -> Result<()> {
    let version = parse_version(&request.version)?;
    debug!("Installing Python {} with {:?}", version, request.options);

    if request.options.reinstall
        && !request.yes
        && config.store().is_installed(&version)
        && !config
            .runtime
            .confirm(&format!("Python {} is already installed. Rebuild it?", version))?
    {
        println!("Reinstall cancelled.");
        return Ok(());
    }

    let orchestrator = config.orchestrator(request.options.build.verbose);
    let installed = orchestrator.install(&version, &request.options).await?;
    println!(
        "Python {} is available as {}",
        installed.version,
        installed.link.display()
    );
    Ok(())
}
