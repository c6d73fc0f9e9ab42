use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::DatasetError;

/// Transport used by the cache to pull a resource body onto disk.
///
/// Implementations write the complete response body to `destination` or
/// fail. Retries and timeouts are the implementation's business; the cache
/// calls `download` at most once per resolve.
pub trait Fetcher: Send + Sync {
    fn download(&self, url: &str, destination: &Path) -> Result<(), DatasetError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, DatasetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("graph-datasets/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DatasetError::Http(err.to_string()))?,
        );
        // Dataset archives can be large; let transfers run to completion.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| DatasetError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn write_response_to_file(
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), DatasetError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "download request failed".to_string());
            return Err(DatasetError::HttpStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| DatasetError::Http(format!("interrupted transfer: {err}")))?;
        Ok(())
    }
}

impl Fetcher for HttpFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<(), DatasetError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| DatasetError::Http(err.to_string()))?;
        Self::write_response_to_file(response, destination)
    }
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn download(&self, url: &str, destination: &Path) -> Result<(), DatasetError> {
        (**self).download(url, destination)
    }
}
