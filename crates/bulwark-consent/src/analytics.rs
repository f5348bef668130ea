//! Analytics bootstrap gate.
//!
//! Tracking is decided once, when the page (or process) starts. Later
//! consent changes take effect on the next start; the gate does not listen
//! to `consentUpdated`.

use tracing::info;

use crate::manager::ConsentManager;
use crate::record::ConsentCategory;

/// Snapshot of whether analytics tracking may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsGate {
    enabled: bool,
}

impl AnalyticsGate {
    pub fn init(manager: &ConsentManager) -> Self {
        let enabled = manager.has_consent(ConsentCategory::Analytics);
        info!(
            "Analytics tracking {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
