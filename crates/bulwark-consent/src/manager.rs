//! Consent manager — the single owner of the visitor's consent record.

use std::sync::Arc;

use bulwark_core::ConsentConfig;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::events::ConsentEvents;
use crate::record::{ConsentCategory, ConsentRecord, ConsentUpdate};
use crate::storage::{ConsentStorage, MemoryStorage};

/// Reads, writes and broadcasts the consent record.
///
/// Nothing here is fatal: storage failures are logged, reads degrade to
/// "no consent on file" and writes to a no-op, so the worst outcome is the
/// banner being shown again.
pub struct ConsentManager {
    storage: Arc<dyn ConsentStorage>,
    events: ConsentEvents,
    config: ConsentConfig,
}

impl ConsentManager {
    /// Create a manager over the given storage, publishing on `events`.
    pub fn new(
        storage: Arc<dyn ConsentStorage>,
        events: ConsentEvents,
        config: ConsentConfig,
    ) -> Self {
        Self {
            storage,
            events,
            config,
        }
    }

    /// Manager with process-local storage and default settings.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            ConsentEvents::new(),
            ConsentConfig::default(),
        )
    }

    pub fn events(&self) -> &ConsentEvents {
        &self.events
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    /// The stored record, if one exists, parses, and matches the current
    /// policy version.
    pub fn get_consent_preferences(&self) -> Option<ConsentRecord> {
        let raw = match self.storage.read(&self.config.cookie_name) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Consent storage unavailable, treating as no consent: {}", e);
                return None;
            }
        };

        let record: ConsentRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unparsable consent record: {}", e);
                return None;
            }
        };

        if record.version != self.config.policy_version {
            debug!(
                "Consent record version {} does not match {}, re-prompting",
                record.version, self.config.policy_version
            );
            return None;
        }

        Some(record)
    }

    /// Whether the visitor allows `category`. Essential is always allowed.
    pub fn has_consent(&self, category: ConsentCategory) -> bool {
        if category == ConsentCategory::Essential {
            return true;
        }
        self.get_consent_preferences()
            .map(|record| record.allows(category))
            .unwrap_or(false)
    }

    /// Whether a valid record is on file (i.e. the banner can stay hidden).
    pub fn has_any_consent(&self) -> bool {
        self.get_consent_preferences().is_some()
    }

    /// Replace the stored record with one built from `update` and, once it
    /// is persisted, notify every listener.
    pub fn save_consent_preferences(&self, update: ConsentUpdate) -> ConsentRecord {
        let record = ConsentRecord::new(update, self.config.policy_version.clone());
        if self.persist(&record) {
            info!(
                "Consent saved: analytics={} marketing={}",
                record.analytics, record.marketing
            );
            self.events.publish(Some(&record));
        }
        record
    }

    fn persist(&self, record: &ConsentRecord) -> bool {
        let Some(expires_at) = Duration::try_days(i64::from(self.config.max_age_days))
            .and_then(|max_age| Utc::now().checked_add_signed(max_age))
        else {
            warn!(
                "Consent max age of {} days is out of range, not persisting",
                self.config.max_age_days
            );
            return false;
        };

        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize consent record: {}", e);
                return false;
            }
        };

        match self.storage.write(&self.config.cookie_name, &json, expires_at) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist consent, listeners not notified: {}", e);
                false
            }
        }
    }

    pub fn accept_all(&self) -> ConsentRecord {
        self.save_consent_preferences(ConsentUpdate::all_granted())
    }

    pub fn reject_all(&self) -> ConsentRecord {
        self.save_consent_preferences(ConsentUpdate::all_refused())
    }

    /// Forget the stored record and tell listeners to ask again.
    pub fn reset_consent(&self) {
        if let Err(e) = self.storage.delete(&self.config.cookie_name) {
            warn!("Failed to clear stored consent: {}", e);
            return;
        }
        info!("Consent reset");
        self.events.publish(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::{Error, Result};
    use chrono::DateTime;
    use parking_lot::Mutex;

    struct BrokenStorage;

    impl ConsentStorage for BrokenStorage {
        fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Storage("storage disabled".into()))
        }
        fn write(&self, _key: &str, _value: &str, _expires_at: DateTime<Utc>) -> Result<()> {
            Err(Error::Storage("quota exceeded".into()))
        }
        fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::Storage("storage disabled".into()))
        }
    }

    fn manager_with(storage: Arc<MemoryStorage>) -> ConsentManager {
        ConsentManager::new(storage, ConsentEvents::new(), ConsentConfig::default())
    }

    fn record_events(mgr: &ConsentManager) -> Arc<Mutex<Vec<Option<ConsentRecord>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        mgr.events()
            .subscribe(move |payload| sink.lock().push(payload.cloned()));
        seen
    }

    #[test]
    fn test_fresh_state() {
        let mgr = ConsentManager::in_memory();
        assert!(!mgr.has_any_consent());
        assert!(mgr.get_consent_preferences().is_none());
        assert!(!mgr.has_consent(ConsentCategory::Analytics));
        assert!(!mgr.has_consent(ConsentCategory::Marketing));
        assert!(mgr.has_consent(ConsentCategory::Essential));
    }

    #[test]
    fn test_round_trip() {
        let updates = [
            ConsentUpdate::default(),
            ConsentUpdate::all_granted(),
            ConsentUpdate::all_refused(),
            ConsentUpdate {
                analytics: None,
                marketing: Some(true),
            },
        ];
        for update in updates {
            let mgr = ConsentManager::in_memory();
            let saved = mgr.save_consent_preferences(update);
            let loaded = mgr.get_consent_preferences().unwrap();

            assert_eq!(loaded, saved);
            assert_eq!(loaded.analytics, update.analytics.unwrap_or(false));
            assert_eq!(loaded.marketing, update.marketing.unwrap_or(false));
            assert!(loaded.essential());
            assert_eq!(loaded.version, bulwark_core::CURRENT_CONSENT_VERSION);
        }
    }

    #[test]
    fn test_partial_save_defaults_marketing_off() {
        let mgr = ConsentManager::in_memory();
        mgr.save_consent_preferences(ConsentUpdate {
            analytics: Some(true),
            marketing: None,
        });
        let record = mgr.get_consent_preferences().unwrap();
        assert!(record.analytics);
        assert!(!record.marketing);
    }

    #[test]
    fn test_reject_all() {
        let mgr = ConsentManager::in_memory();
        mgr.reject_all();
        assert!(!mgr.has_consent(ConsentCategory::Analytics));
        assert!(!mgr.has_consent(ConsentCategory::Marketing));
        assert!(mgr.has_consent(ConsentCategory::Essential));
        assert!(mgr.has_any_consent());
    }

    #[test]
    fn test_write_replaces_previous_record() {
        let storage = Arc::new(MemoryStorage::new());
        let mgr = manager_with(storage.clone());
        mgr.accept_all();
        mgr.save_consent_preferences(ConsentUpdate {
            analytics: None,
            marketing: Some(true),
        });

        let record = mgr.get_consent_preferences().unwrap();
        assert!(!record.analytics);
        assert!(record.marketing);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_version_gate() {
        let storage = Arc::new(MemoryStorage::new());
        let stale = r#"{"essential":true,"analytics":true,"marketing":true,"timestamp":"2025-01-01T00:00:00Z","version":"0.9"}"#;
        storage
            .write("consent_preferences", stale, Utc::now() + Duration::days(10))
            .unwrap();

        let mgr = manager_with(storage);
        assert!(mgr.get_consent_preferences().is_none());
        assert!(!mgr.has_any_consent());
        assert!(!mgr.has_consent(ConsentCategory::Analytics));
    }

    #[test]
    fn test_malformed_record_reads_as_none() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .write("consent_preferences", "{garbage", Utc::now() + Duration::days(1))
            .unwrap();

        let mgr = manager_with(storage);
        assert!(mgr.get_consent_preferences().is_none());
        assert!(!mgr.has_consent(ConsentCategory::Marketing));
        assert!(mgr.has_consent(ConsentCategory::Essential));
    }

    #[test]
    fn test_expired_record_reads_as_none() {
        let storage = Arc::new(MemoryStorage::new());
        let mgr = manager_with(storage.clone());
        let record = ConsentRecord::new(ConsentUpdate::all_granted(), "1.0");
        storage
            .write(
                "consent_preferences",
                &serde_json::to_string(&record).unwrap(),
                Utc::now() - Duration::seconds(1),
            )
            .unwrap();
        assert!(!mgr.has_any_consent());
    }

    #[test]
    fn test_reset_clears_state() {
        let mgr = ConsentManager::in_memory();
        mgr.accept_all();
        mgr.reset_consent();
        assert!(mgr.get_consent_preferences().is_none());
        assert!(!mgr.has_any_consent());
        assert!(mgr.has_consent(ConsentCategory::Essential));
    }

    #[test]
    fn test_broadcast_once_per_mutation() {
        let mgr = ConsentManager::in_memory();
        let seen = record_events(&mgr);

        mgr.accept_all();
        {
            let events = seen.lock();
            assert_eq!(events.len(), 1);
            let record = events[0].as_ref().unwrap();
            assert!(record.analytics && record.marketing);
        }

        mgr.reset_consent();
        let events = seen.lock();
        assert_eq!(events.len(), 2);
        assert!(events[1].is_none());
    }

    #[test]
    fn test_reads_do_not_broadcast() {
        let mgr = ConsentManager::in_memory();
        let seen = record_events(&mgr);
        mgr.get_consent_preferences();
        mgr.has_consent(ConsentCategory::Analytics);
        mgr.has_any_consent();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_broken_storage_degrades() {
        let mgr = ConsentManager::new(
            Arc::new(BrokenStorage),
            ConsentEvents::new(),
            ConsentConfig::default(),
        );
        let seen = record_events(&mgr);

        assert!(!mgr.has_any_consent());
        let record = mgr.accept_all();
        assert!(record.analytics);
        assert!(!mgr.has_consent(ConsentCategory::Analytics));
        mgr.reset_consent();

        // Nothing was persisted, so nothing was announced.
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_failed_reset_keeps_record_and_stays_quiet() {
        struct UndeletableStorage(MemoryStorage);

        impl ConsentStorage for UndeletableStorage {
            fn read(&self, key: &str) -> Result<Option<String>> {
                self.0.read(key)
            }
            fn write(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
                self.0.write(key, value, expires_at)
            }
            fn delete(&self, _key: &str) -> Result<()> {
                Err(Error::Storage("read-only".into()))
            }
        }

        let mgr = ConsentManager::new(
            Arc::new(UndeletableStorage(MemoryStorage::new())),
            ConsentEvents::new(),
            ConsentConfig::default(),
        );
        mgr.accept_all();
        let seen = record_events(&mgr);

        mgr.reset_consent();
        assert!(mgr.has_any_consent());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_out_of_range_max_age_is_not_fatal() {
        let storage = Arc::new(MemoryStorage::new());
        let config = ConsentConfig {
            max_age_days: 4_000_000_000,
            ..ConsentConfig::default()
        };
        let mgr = ConsentManager::new(storage.clone(), ConsentEvents::new(), config);
        let seen = record_events(&mgr);

        let record = mgr.accept_all();
        assert!(record.analytics);
        assert!(storage.is_empty());
        assert!(!mgr.has_any_consent());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_custom_cookie_name_and_max_age() {
        let storage = Arc::new(MemoryStorage::new());
        let config = ConsentConfig {
            cookie_name: "cc".into(),
            max_age_days: 1,
            ..ConsentConfig::default()
        };
        let mgr = ConsentManager::new(storage.clone(), ConsentEvents::new(), config);
        mgr.reject_all();
        assert!(storage.read("cc").unwrap().is_some());
        assert!(storage.read("consent_preferences").unwrap().is_none());
    }
}
