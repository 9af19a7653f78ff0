use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};

use crate::domain::DownloadCredentials;
use crate::error::GbifImageError;

pub trait GbifClient: Send + Sync {
    /// Runs one occurrence search with the given query parameters and
    /// returns the raw occurrence records.
    fn search_occurrences(&self, params: &[(String, String)]) -> Result<Vec<Value>, GbifImageError>;

    /// Issues one formal download request scoped to the given GBIF ids and
    /// returns the upstream response as text.
    fn request_download(
        &self,
        gbif_ids: &[String],
        credentials: &DownloadCredentials,
    ) -> Result<String, GbifImageError>;
}

#[derive(Clone)]
pub struct GbifHttpClient {
    client: Client,
    base_url: String,
}

impl GbifHttpClient {
    pub fn new() -> Result<Self, GbifImageError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gbif-im/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GbifImageError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GbifImageError::GbifHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: "https://api.gbif.org/v1".to_string(),
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GbifImageError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "GBIF request failed".to_string());
        Err(GbifImageError::GbifStatus { status, message })
    }
}

impl GbifClient for GbifHttpClient {
    fn search_occurrences(&self, params: &[(String, String)]) -> Result<Vec<Value>, GbifImageError> {
        let url = format!("{}/occurrence/search", self.base_url);
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .map_err(|err| GbifImageError::GbifHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| GbifImageError::GbifHttp(err.to_string()))?;
        Ok(body
            .get("results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    fn request_download(
        &self,
        gbif_ids: &[String],
        credentials: &DownloadCredentials,
    ) -> Result<String, GbifImageError> {
        let url = format!("{}/occurrence/download/request", self.base_url);
        let body = json!({
            "creator": credentials.username,
            "notificationAddresses": [credentials.email],
            "format": "DWCA",
            "predicate": {
                "type": "in",
                "key": "GBIF_ID",
                "values": gbif_ids,
            },
        });
        let response = self
            .client
            .post(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .json(&body)
            .send()
            .map_err(|err| GbifImageError::GbifHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| GbifImageError::GbifHttp(err.to_string()))
    }
}
