use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::GbifImageError;

/// Downloads one media URL to one destination file. A single attempt per
/// image; pacing between attempts belongs to the fetch loop, not the
/// fetcher.
pub trait MediaFetcher: Send + Sync {
    fn download(&self, url: &str, destination: &Path) -> Result<(), GbifImageError>;
}

#[derive(Clone)]
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, GbifImageError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gbif-im/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GbifImageError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GbifImageError::MediaHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl MediaFetcher for HttpMediaFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<(), GbifImageError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| GbifImageError::MediaHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "media request failed".to_string());
            return Err(GbifImageError::MediaStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| GbifImageError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| GbifImageError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
