//! Bulwark Core — shared error type and site configuration.

pub mod config;
pub mod error;

pub use config::{
    is_valid_cookie_name, ConsentConfig, DataPaths, SiteConfig, CURRENT_CONSENT_VERSION,
    MAX_CONSENT_AGE_DAYS,
};
pub use error::{Error, Result};
