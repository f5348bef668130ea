//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::error::{Error, Result};

/// Policy version new consent records are captured under.
pub const CURRENT_CONSENT_VERSION: &str = "1.0";

/// Upper bound for `max_age_days`. Browsers cap cookie lifetimes at 400 days.
pub const MAX_CONSENT_AGE_DAYS: u32 = 400;

/// Whether `name` is a valid cookie name (an RFC 6265 token).
pub fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}

/// Paths to Bulwark's on-disk data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// File-backed consent store (`data/consent.json`).
    pub consent_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the root if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            consent_file: root.join("consent.json"),
            root,
        })
    }
}

/// Consent record settings shared by the manager, the banner and the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentConfig {
    /// Storage key (cookie name) the record lives under.
    pub cookie_name: String,
    /// Version a stored record must carry to be honoured.
    pub policy_version: String,
    /// Expiry horizon applied on every write.
    pub max_age_days: u32,
    /// How long the banner waits before showing itself.
    pub banner_delay_ms: u64,
    /// Mark the consent cookie `Secure`.
    pub secure_cookie: bool,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            cookie_name: "consent_preferences".into(),
            policy_version: CURRENT_CONSENT_VERSION.into(),
            max_age_days: 365,
            banner_delay_ms: 1000,
            secure_cookie: false,
        }
    }
}

/// Top-level site configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// HTTP server port.
    pub port: u16,
    /// Base URL of the contact and privacy endpoints.
    pub api_base: String,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Consent record settings.
    pub consent: ConsentConfig,
}

impl SiteConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_vars(data_dir, |key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(data_dir: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ConsentConfig::default();

        let cookie_name = match lookup("BULWARK_CONSENT_COOKIE") {
            Some(name) if !name.trim().is_empty() => {
                let name = name.trim().to_string();
                if !is_valid_cookie_name(&name) {
                    return Err(Error::Config(format!(
                        "BULWARK_CONSENT_COOKIE={:?} is not a valid cookie name",
                        name
                    )));
                }
                name
            }
            _ => defaults.cookie_name,
        };

        let max_age_days = match parse_var(&lookup, "BULWARK_CONSENT_MAX_AGE_DAYS") {
            Some(days) if days > MAX_CONSENT_AGE_DAYS => {
                warn!(
                    "BULWARK_CONSENT_MAX_AGE_DAYS={} exceeds {}, clamping",
                    days, MAX_CONSENT_AGE_DAYS
                );
                MAX_CONSENT_AGE_DAYS
            }
            Some(days) => days,
            None => defaults.max_age_days,
        };

        let consent = ConsentConfig {
            cookie_name,
            policy_version: defaults.policy_version,
            max_age_days,
            banner_delay_ms: parse_var(&lookup, "BULWARK_BANNER_DELAY_MS")
                .unwrap_or(defaults.banner_delay_ms),
            secure_cookie: parse_var(&lookup, "BULWARK_SECURE_COOKIE")
                .unwrap_or(defaults.secure_cookie),
        };

        let api_base = lookup("BULWARK_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://localhost:3000".into());

        Ok(Self {
            port: parse_var(&lookup, "PORT").unwrap_or(3000),
            api_base,
            data_paths: DataPaths::new(data_dir)?,
            consent,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}
