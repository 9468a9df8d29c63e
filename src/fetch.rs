//! Retrieval of CPython source archives from the upstream FTP tree.

use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::download::download_file;
use crate::error::{Error, Result};
use crate::http::{HttpClient, NonRetryableError};
use crate::runtime::Runtime;
use crate::version::PythonVersion;

/// Canonical location of CPython source releases.
pub const DEFAULT_SOURCE_URL: &str = "https://www.python.org/ftp/python";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Download the source archive of `version` into `scratch_dir` and return its path.
    ///
    /// `scratch_dir` belongs to this call; nothing outside it is touched.
    async fn fetch(&self, version: &PythonVersion, scratch_dir: &Path) -> Result<PathBuf>;

    /// Versions listed in the upstream index, ascending.
    async fn available_versions(&self) -> Result<Vec<PythonVersion>>;
}

pub struct HttpSourceFetcher<R: Runtime> {
    runtime: Arc<R>,
    http: HttpClient,
    base_url: String,
}

impl<R: Runtime> HttpSourceFetcher<R> {
    pub fn new(runtime: Arc<R>, http: HttpClient, base_url: Option<String>) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            runtime,
            http,
            base_url,
        }
    }

    pub fn archive_url(&self, version: &PythonVersion) -> String {
        format!("{}/{}/{}", self.base_url, version, version.archive_name())
    }

    fn verify(&self, archive: &Path, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Err(Error::network(
                format!("downloaded archive {:?} is empty", archive),
                None,
            ));
        }
        let mut magic = [0u8; 2];
        self.runtime.open(archive)?.read_exact(&mut magic).map_err(|e| {
            Error::network(
                format!("downloaded archive {:?} is truncated", archive),
                Some(e.into()),
            )
        })?;
        if magic != GZIP_MAGIC {
            return Err(Error::network(
                format!("downloaded archive {:?} is not a gzip file", archive),
                None,
            ));
        }
        Ok(())
    }
}

fn classify_download_error(version: &PythonVersion, url: &str, e: anyhow::Error) -> Error {
    match e.downcast_ref::<NonRetryableError>() {
        Some(NonRetryableError::Forbidden(_)) => Error::network(
            format!("access to {} was denied; check --source-url", url),
            Some(e),
        ),
        Some(NonRetryableError::NotFound(_) | NonRetryableError::ClientError(_)) => {
            Error::not_found(format!("Python {} source archive ({})", version, url))
        }
        None => Error::network(format!("failed to download {}", url), Some(e)),
    }
}

/// Extract `X.Y.Z/` directory links from the upstream index page.
pub fn parse_index(html: &str) -> Vec<PythonVersion> {
    let mut versions: Vec<PythonVersion> = html
        .split("href=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .filter_map(|href| href.strip_suffix('/'))
        .filter_map(|name| name.parse().ok())
        .collect();
    versions.sort();
    versions.dedup();
    versions
}

#[async_trait]
impl<R: Runtime + 'static> SourceFetcher for HttpSourceFetcher<R> {
    #[tracing::instrument(skip(self, scratch_dir))]
    async fn fetch(&self, version: &PythonVersion, scratch_dir: &Path) -> Result<PathBuf> {
        let url = self.archive_url(version);
        self.runtime.create_dir_all(scratch_dir)?;
        let archive = scratch_dir.join(version.archive_name());

        let bytes = download_file(self.runtime.as_ref(), &url, &archive, &self.http)
            .await
            .map_err(|e| classify_download_error(version, &url, e))?;

        self.verify(&archive, bytes)?;
        debug!("Verified {:?} ({} bytes)", archive, bytes);
        Ok(archive)
    }

    async fn available_versions(&self) -> Result<Vec<PythonVersion>> {
        let index_url = format!("{}/", self.base_url);
        let html = self
            .http
            .get_text(&index_url)
            .await
            .map_err(|e| Error::network(format!("failed to read {}", index_url), Some(e)))?;
        Ok(parse_index(&html))
    }
}
