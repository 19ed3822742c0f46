//! Metadata publishing: pin the NFT metadata record and return its gateway URL.
//!
//! The record is uploaded as a small JSON file to Pinata's
//! `pinFileToIPFS` endpoint. The content identifier in the response
//! (`IpfsHash`) is appended to the gateway base to form the token URI.

use crate::config::ServerConfig;
use crate::error::AriaError;
use crate::output::NftMetadata;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Content-addressed storage for metadata records.
#[async_trait]
pub trait MetadataPublisher: Send + Sync {
    /// Upload `metadata` and return a retrievable URI. Exactly one attempt.
    async fn publish(&self, metadata: &NftMetadata) -> Result<String, AriaError>;
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

/// [`MetadataPublisher`] for the Pinata pinning API.
#[derive(Clone)]
pub struct PinataPublisher {
    client: reqwest::Client,
    api_key: Option<String>,
    secret_api_key: Option<String>,
    api_url: String,
    gateway_url: String,
    timeout_secs: u64,
}

impl PinataPublisher {
    pub fn from_config(config: &ServerConfig) -> Result<Self, AriaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.publish_timeout_secs))
            .build()
            .map_err(|e| AriaError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: non_empty(&config.pinata_api_key),
            secret_api_key: non_empty(&config.pinata_secret_api_key),
            api_url: config.pinata_api_url.trim_end_matches('/').to_string(),
            gateway_url: config.pinata_gateway_url.trim_end_matches('/').to_string(),
            timeout_secs: config.publish_timeout_secs,
        })
    }

    /// Gateway URL for a content identifier.
    pub fn gateway_link(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, cid)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

#[async_trait]
impl MetadataPublisher for PinataPublisher {
    async fn publish(&self, metadata: &NftMetadata) -> Result<String, AriaError> {
        let (Some(api_key), Some(secret)) = (&self.api_key, &self.secret_api_key) else {
            return Err(AriaError::PublishCredentialsMissing);
        };

        let body = serde_json::to_vec(metadata)
            .map_err(|e| AriaError::Internal(format!("metadata serialisation: {e}")))?;
        let part = reqwest::multipart::Part::bytes(body)
            .file_name(metadata.file_name())
            .mime_str("application/json")
            .map_err(|e| AriaError::Internal(format!("multipart part: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        debug!("Pinning '{}' to {}", metadata.file_name(), url);

        let response = self
            .client
            .post(&url)
            .header("pinata_api_key", api_key)
            .header("pinata_secret_api_key", secret)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AriaError::PublishTimeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    AriaError::PublishRequestFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AriaError::PublishRejected {
                status: status.as_u16(),
                body,
            });
        }

        let pinned: PinResponse = response.json().await.map_err(|e| {
            AriaError::PublishRequestFailed {
                reason: format!("unreadable response: {e}"),
            }
        })?;

        let cid = pinned
            .ipfs_hash
            .filter(|h| !h.is_empty())
            .ok_or(AriaError::MissingContentId)?;

        let link = self.gateway_link(&cid);
        info!("Metadata pinned: {}", link);
        Ok(link)
    }
}
