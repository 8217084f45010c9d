//! HTTP access: release downloads and health probes

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::errors::DeployError;

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Download `url` fully into memory; non-2xx is an error
    async fn download(&self, url: &str) -> Result<Vec<u8>, DeployError>;

    /// Status code of a GET on `url`
    ///
    /// `Ok(None)` means nothing answered (refused, reset, timed out). `Err`
    /// means the request itself could not be formed.
    async fn get_status(&self, url: &str) -> Result<Option<u16>, DeployError>;
}

/// reqwest-backed client
pub struct ReqwestClient {
    download: Client,
    probe: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, DeployError> {
        let download = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        let probe = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { download, probe })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn download(&self, url: &str) -> Result<Vec<u8>, DeployError> {
        debug!("GET {}", url);
        let response = self.download.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_status(&self, url: &str) -> Result<Option<u16>, DeployError> {
        match self.probe.get(url).send().await {
            Ok(response) => Ok(Some(response.status().as_u16())),
            Err(e) if e.is_builder() => Err(DeployError::HttpError(e)),
            Err(e) => {
                debug!("Probe {} unanswered: {}", url, e);
                Ok(None)
            }
        }
    }
}
