//! The consent record and the categories it covers.

use std::fmt;
use std::str::FromStr;

use bulwark_core::Error;
use serde::{Deserialize, Serialize};

/// Tracking categories a visitor can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentCategory {
    /// Strictly necessary cookies. Cannot be refused.
    Essential,
    Analytics,
    Marketing,
}

impl ConsentCategory {
    pub fn all() -> &'static [ConsentCategory] {
        &[Self::Essential, Self::Analytics, Self::Marketing]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::Analytics => "analytics",
            Self::Marketing => "marketing",
        }
    }
}

impl fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "essential" => Ok(Self::Essential),
            "analytics" => Ok(Self::Analytics),
            "marketing" => Ok(Self::Marketing),
            other => Err(Error::Validation(format!(
                "unknown consent category '{}'",
                other
            ))),
        }
    }
}

/// Partial preferences submitted by the banner or the preference center.
/// Omitted categories are treated as refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<bool>,
}

impl ConsentUpdate {
    /// Every optional category granted.
    pub fn all_granted() -> Self {
        Self {
            analytics: Some(true),
            marketing: Some(true),
        }
    }

    /// Every optional category refused.
    pub fn all_refused() -> Self {
        Self {
            analytics: Some(false),
            marketing: Some(false),
        }
    }
}

/// A visitor's consent choices as persisted.
///
/// Essential consent is not a field: it is implied by every record and is
/// always written out as `true`, whatever a stored copy claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord", into = "StoredRecord")]
pub struct ConsentRecord {
    pub analytics: bool,
    pub marketing: bool,
    /// RFC 3339 time the record was written.
    pub timestamp: String,
    /// Policy version the choices were made under.
    pub version: String,
}

impl ConsentRecord {
    /// Build a fresh record stamped with the current time.
    pub fn new(update: ConsentUpdate, version: impl Into<String>) -> Self {
        Self {
            analytics: update.analytics.unwrap_or(false),
            marketing: update.marketing.unwrap_or(false),
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: version.into(),
        }
    }

    pub fn essential(&self) -> bool {
        true
    }

    /// Whether this record grants the given category.
    pub fn allows(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Essential => true,
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Marketing => self.marketing,
        }
    }
}

/// Wire shape of a record: `{essential, analytics, marketing, timestamp, version}`.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    #[serde(default = "essential_default")]
    essential: bool,
    analytics: bool,
    marketing: bool,
    timestamp: String,
    version: String,
}

fn essential_default() -> bool {
    true
}

impl From<StoredRecord> for ConsentRecord {
    fn from(stored: StoredRecord) -> Self {
        Self {
            analytics: stored.analytics,
            marketing: stored.marketing,
            timestamp: stored.timestamp,
            version: stored.version,
        }
    }
}

impl From<ConsentRecord> for StoredRecord {
    fn from(record: ConsentRecord) -> Self {
        Self {
            essential: true,
            analytics: record.analytics,
            marketing: record.marketing,
            timestamp: record.timestamp,
            version: record.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_omitted_categories_default_to_refused() {
        let record = ConsentRecord::new(
            ConsentUpdate {
                analytics: Some(true),
                marketing: None,
            },
            "1.0",
        );
        assert!(record.analytics);
        assert!(!record.marketing);
        assert!(record.essential());
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_wire_shape() {
        let record = ConsentRecord::new(ConsentUpdate::all_refused(), "1.0");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["essential"], true);
        assert_eq!(json["analytics"], false);
        assert_eq!(json["marketing"], false);
        assert_eq!(json["version"], "1.0");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_stored_essential_false_is_ignored() {
        let raw = r#"{"essential":false,"analytics":true,"marketing":false,"timestamp":"2026-01-01T00:00:00Z","version":"1.0"}"#;
        let record: ConsentRecord = serde_json::from_str(raw).unwrap();
        assert!(record.essential());
        assert!(record.allows(ConsentCategory::Essential));
        assert_eq!(serde_json::to_value(&record).unwrap()["essential"], true);
    }

    #[test]
    fn test_missing_category_is_malformed() {
        let raw = r#"{"essential":true,"analytics":true,"timestamp":"x","version":"1.0"}"#;
        assert!(serde_json::from_str::<ConsentRecord>(raw).is_err());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            "Analytics".parse::<ConsentCategory>().unwrap(),
            ConsentCategory::Analytics
        );
        assert!("advertising".parse::<ConsentCategory>().is_err());
        for category in ConsentCategory::all() {
            assert_eq!(category.as_str().parse::<ConsentCategory>().unwrap(), *category);
        }
    }
}
