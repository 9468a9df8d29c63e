use anyhow::Result;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    builder::SourceBuilder,
    fetch::HttpSourceFetcher,
    http::HttpClient,
    layout::Layout,
    orchestrator::Orchestrator,
    runtime::Runtime,
    store::VersionStore,
    toolchain::NativeToolchain,
};

/// Settings given on the command line or through `ALTPY_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub root: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub source_url: Option<String>,
}

pub type NativeOrchestrator<R> =
    Orchestrator<R, HttpSourceFetcher<R>, SourceBuilder<R, NativeToolchain>>;

/// Everything a command needs, resolved once from [`Settings`].
pub struct Config<R: Runtime> {
    pub runtime: Arc<R>,
    pub layout: Layout,
    pub http: HttpClient,
    pub source_url: Option<String>,
}

impl<R: Runtime + 'static> Config<R> {
    pub fn new(runtime: R, settings: Settings) -> Result<Self> {
        let layout = Layout::resolve(&runtime, settings.root, settings.bin_dir)?;
        debug!(
            "Layout: installs={:?} bin={:?}",
            layout.installs_dir(),
            layout.bin_dir()
        );
        Ok(Self {
            runtime: Arc::new(runtime),
            layout,
            http: HttpClient::default_client()?,
            source_url: settings.source_url,
        })
    }

    pub fn store(&self) -> VersionStore<R> {
        VersionStore::new(Arc::clone(&self.runtime), self.layout.clone())
    }

    pub fn fetcher(&self) -> HttpSourceFetcher<R> {
        HttpSourceFetcher::new(
            Arc::clone(&self.runtime),
            self.http.clone(),
            self.source_url.clone(),
        )
    }

    /// Orchestrator wired to the network and the native toolchain.
    pub fn orchestrator(&self, verbose: bool) -> NativeOrchestrator<R> {
        let store = self.store();
        let builder = SourceBuilder::new(
            Arc::clone(&self.runtime),
            store.clone(),
            NativeToolchain::new(verbose),
        );
        Orchestrator::new(Arc::clone(&self.runtime), store, self.fetcher(), builder)
    }
}
