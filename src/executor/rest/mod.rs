//! Executors for schedulers reached over plain REST.

pub mod chronos;
pub mod flink;

pub use chronos::{ChronosExecutor, ChronosJob};
pub use flink::FlinkExecutor;

use crate::error::{AppError, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin JSON client rooted at a scheduler's base address
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base: Url,
}

impl RestClient {
    pub fn new(addr: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(addr)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve path segments against the base. Segments are percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(self.base.join(&path)?)
    }

    pub async fn get(&self, url: Url) -> Result<Response> {
        debug!("🌐 GET {}", url);
        Ok(self.client.get(url).send().await?)
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, url: Url, body: &T) -> Result<Response> {
        debug!("🌐 POST {}", url);
        Ok(self.client.post(url).json(body).send().await?)
    }

    pub async fn delete(&self, url: Url) -> Result<Response> {
        debug!("🌐 DELETE {}", url);
        Ok(self.client.delete(url).send().await?)
    }
}

/// Pass a 2xx response through, turn anything else into an error.
pub async fn expect_success(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::ExternalServiceError(format!(
        "failed to {}: status {}, body: {}",
        action, status, body
    )))
}

/// Like [`expect_success`] but a 404 yields `None`.
pub async fn expect_found(response: Response, action: &str) -> Result<Option<Response>> {
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    expect_success(response, action).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_keeps_base_path_and_encodes_segments() {
        let client = RestClient::new("http://chronos.local:4400/api", Duration::from_secs(1)).unwrap();
        let url = client.url(&["v1", "scheduler", "job", "ns 1.abc"]).unwrap();
        assert_eq!(url.as_str(), "http://chronos.local:4400/api/v1/scheduler/job/ns%201.abc");
    }

    #[test]
    fn test_invalid_address_is_a_configuration_error() {
        let result = RestClient::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }
}
