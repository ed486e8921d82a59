//! IPFS HTTP API transport.
//!
//! `put` posts a multipart upload to `{api_url}/api/v0/add?pin=true` and reads
//! the content address from the `Hash` field of the JSON response. `get`
//! reads `{gateway_url}/ipfs/{address}`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::{StorageError, StorageResult};
use crate::transport::BlobTransport;

/// Endpoints and limits for [`HttpBlobTransport`].
#[derive(Debug, Clone)]
pub struct HttpBlobConfig {
    /// Base URL of the IPFS HTTP API (e.g. `http://127.0.0.1:5001`).
    pub api_url: String,

    /// Base URL of the gateway used for reads.
    pub gateway_url: String,

    /// Client-level timeout per request.
    pub timeout: Duration,
}

impl Default for HttpBlobConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".to_string(),
            gateway_url: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Blob transport backed by an IPFS node.
#[derive(Debug, Clone)]
pub struct HttpBlobTransport {
    client: reqwest::Client,
    config: HttpBlobConfig,
}

impl HttpBlobTransport {
    /// Build a transport with its own HTTP client.
    pub fn new(config: HttpBlobConfig) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Build a transport over an existing HTTP client.
    ///
    /// `config.timeout` is only used to report timeouts; the client's own
    /// timeout applies.
    pub fn with_client(client: reqwest::Client, config: HttpBlobConfig) -> Self {
        Self { client, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &HttpBlobConfig {
        &self.config
    }

    fn add_url(&self) -> String {
        format!("{}/api/v0/add?pin=true", self.config.api_url.trim_end_matches('/'))
    }

    fn gateway_url(&self, address: &str) -> String {
        format!("{}/ipfs/{}", self.config.gateway_url.trim_end_matches('/'), address)
    }

    fn map_error(&self, e: reqwest::Error) -> StorageError {
        if e.is_timeout() {
            StorageError::Timeout(self.config.timeout)
        } else {
            StorageError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl BlobTransport for HttpBlobTransport {
    async fn put(&self, data: Bytes) -> StorageResult<String> {
        let url = self.add_url();
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name("blob");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                target: url,
            });
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        tracing::debug!(address = %added.hash, "blob pinned");
        Ok(added.hash)
    }

    async fn get(&self, address: &str) -> StorageResult<Bytes> {
        let url = self.gateway_url(address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(address.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                target: url,
            });
        }

        response.bytes().await.map_err(|e| self.map_error(e))
    }
}
