//! Shared application state.

use std::sync::Arc;

use bulwark_consent::{ConsentEvents, ConsentManager, ConsentStorage, CONSENT_UPDATED};
use bulwark_core::SiteConfig;
use tracing::info;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: SiteConfig,
    /// Process-wide `consentUpdated` channel. Every request-scoped manager
    /// publishes here.
    pub events: ConsentEvents,
}

impl AppState {
    pub fn new(config: SiteConfig) -> Self {
        let events = ConsentEvents::new();

        // Audit trail of every consent change made through the API.
        events.subscribe(|payload| match payload {
            Some(record) => info!(
                event = CONSENT_UPDATED,
                analytics = record.analytics,
                marketing = record.marketing,
                version = %record.version,
                "Consent recorded"
            ),
            None => info!(event = CONSENT_UPDATED, "Consent reset"),
        });

        Self { config, events }
    }

    /// A consent manager over one request's storage.
    pub fn consent_manager(&self, storage: Arc<dyn ConsentStorage>) -> ConsentManager {
        ConsentManager::new(storage, self.events.clone(), self.config.consent.clone())
    }
}
