//! HTTP client for the contact and privacy endpoints.

use std::time::Duration;

use bulwark_core::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::types::{ApiAck, ContactSubmission, DeletionRequest, UnsubscribeRequest};

pub const CONTACT_PATH: &str = "/api/zoho/contact";
pub const DELETE_DATA_PATH: &str = "/api/privacy/delete-data";
pub const UNSUBSCRIBE_PATH: &str = "/api/privacy/unsubscribe";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Posts validated form payloads and reports the endpoint's `success` flag.
#[derive(Clone)]
pub struct LeadClient {
    http: Client,
    base_url: String,
}

impl LeadClient {
    /// Client for endpoints under `base_url` (e.g. `https://example.com`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward a contact form to the CRM endpoint.
    pub async fn submit_contact(&self, submission: &ContactSubmission) -> Result<bool> {
        submission.validate()?;
        let ack = self.post(CONTACT_PATH, submission).await?;
        info!("Contact submission accepted={}", ack.success);
        Ok(ack.success)
    }

    /// Ask for everything held about an email address to be erased.
    pub async fn request_data_deletion(&self, request: &DeletionRequest) -> Result<bool> {
        request.validate()?;
        let ack = self.post(DELETE_DATA_PATH, request).await?;
        info!("Data deletion request accepted={}", ack.success);
        Ok(ack.success)
    }

    pub async fn unsubscribe(&self, request: &UnsubscribeRequest) -> Result<bool> {
        request.validate()?;
        let ack = self.post(UNSUBSCRIBE_PATH, request).await?;
        info!("Unsubscribe request accepted={}", ack.success);
        Ok(ack.success)
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiAck> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("{} answered {}: {}", path, status, text);
            return Err(Error::Http(format!("{} answered {}", path, status)));
        }

        let ack = response
            .json::<ApiAck>()
            .await
            .map_err(|e| Error::Http(format!("Invalid response from {}: {}", path, e)))?;
        if let Some(message) = &ack.message {
            debug!("{} said: {}", path, message);
        }
        Ok(ack)
    }
}
