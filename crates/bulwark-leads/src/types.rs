//! Form payloads and the acknowledgement shape shared by every endpoint.

use bulwark_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_email(email: &str) -> Result<()> {
    require("email", email)?;
    if !EMAIL_RE.is_match(email) {
        return Err(Error::Validation(format!("'{}' is not a valid email", email)));
    }
    Ok(())
}

/// A contact form submission, forwarded to the CRM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Service the lead is asking about (e.g. "SOC 2 readiness").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    pub message: String,
    /// Page the form was submitted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<String>,
}

impl ContactSubmission {
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require_email(&self.email)?;
        require("message", &self.message)
    }
}

/// Request to erase everything held about an email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// RFC 3339 time the visitor asked.
    pub requested_at: String,
}

impl DeletionRequest {
    pub fn new(email: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            reason,
            requested_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_email(&self.email)
    }
}

/// Request to stop marketing email to an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub requested_at: String,
}

impl UnsubscribeRequest {
    pub fn new(email: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            reason,
            requested_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_email(&self.email)
    }
}

/// `{success: boolean}` reply of the contact and privacy endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
