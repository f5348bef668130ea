//! Cookie banner and preference center view state.
//!
//! These are the consumers of the consent manager: they never touch storage
//! and learn about changes made elsewhere only through `consentUpdated`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::events::SubscriptionId;
use crate::manager::ConsentManager;
use crate::record::{ConsentCategory, ConsentRecord, ConsentUpdate};

/// Visibility of the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerState {
    Hidden,
    /// No consent on file; waiting out the reveal delay.
    Pending,
    Visible,
}

/// The cookie banner. Subscribed to `consentUpdated` for as long as it lives.
pub struct ConsentBanner {
    manager: Arc<ConsentManager>,
    state: Arc<Mutex<BannerState>>,
    subscription: SubscriptionId,
}

impl ConsentBanner {
    /// Mount the banner. Without a valid record it starts out [`BannerState::Pending`]
    /// and should be revealed once [`reveal_delay`](Self::reveal_delay) has passed.
    pub fn mount(manager: Arc<ConsentManager>) -> Self {
        let initial = if manager.has_any_consent() {
            BannerState::Hidden
        } else {
            BannerState::Pending
        };
        let state = Arc::new(Mutex::new(initial));

        let shared = state.clone();
        let subscription = manager.events().subscribe(move |payload| {
            let next = match payload {
                Some(_) => BannerState::Hidden,
                None => BannerState::Visible,
            };
            *shared.lock() = next;
        });

        debug!("Consent banner mounted as {:?}", initial);
        Self {
            manager,
            state,
            subscription,
        }
    }

    pub fn state(&self) -> BannerState {
        *self.state.lock()
    }

    pub fn is_visible(&self) -> bool {
        self.state() == BannerState::Visible
    }

    /// How long to wait before calling [`reveal`](Self::reveal), if a reveal is due.
    pub fn reveal_delay(&self) -> Option<Duration> {
        match self.state() {
            BannerState::Pending => Some(Duration::from_millis(
                self.manager.config().banner_delay_ms,
            )),
            _ => None,
        }
    }

    /// Show a pending banner. A choice made during the delay keeps it hidden.
    pub fn reveal(&self) -> BannerState {
        let mut state = self.state.lock();
        if *state == BannerState::Pending {
            *state = BannerState::Visible;
        }
        *state
    }

    pub fn accept_all(&self) -> ConsentRecord {
        self.manager.accept_all()
    }

    pub fn reject_all(&self) -> ConsentRecord {
        self.manager.reject_all()
    }

    /// Open the preference center seeded from the current record.
    pub fn manage_preferences(&self) -> PreferenceCenter {
        PreferenceCenter::open(self.manager.clone())
    }
}

impl Drop for ConsentBanner {
    fn drop(&mut self) {
        self.manager.events().unsubscribe(self.subscription);
    }
}

/// Per-category toggles, committed only on [`save`](PreferenceCenter::save).
pub struct PreferenceCenter {
    manager: Arc<ConsentManager>,
    analytics: bool,
    marketing: bool,
}

impl PreferenceCenter {
    pub fn open(manager: Arc<ConsentManager>) -> Self {
        let (analytics, marketing) = manager
            .get_consent_preferences()
            .map(|record| (record.analytics, record.marketing))
            .unwrap_or((false, false));
        Self {
            manager,
            analytics,
            marketing,
        }
    }

    /// Current toggle position. Essential is always on.
    pub fn is_enabled(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Essential => true,
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Marketing => self.marketing,
        }
    }

    /// Set a toggle. Returns false (and changes nothing) for essential.
    pub fn set(&mut self, category: ConsentCategory, enabled: bool) -> bool {
        match category {
            ConsentCategory::Essential => {
                warn!("Essential cookies cannot be toggled");
                false
            }
            ConsentCategory::Analytics => {
                self.analytics = enabled;
                true
            }
            ConsentCategory::Marketing => {
                self.marketing = enabled;
                true
            }
        }
    }

    /// Flip a toggle and return its new position.
    pub fn toggle(&mut self, category: ConsentCategory) -> bool {
        let next = !self.is_enabled(category);
        self.set(category, next);
        self.is_enabled(category)
    }

    /// Commit the toggles and close the view.
    pub fn save(self) -> ConsentRecord {
        self.manager.save_consent_preferences(ConsentUpdate {
            analytics: Some(self.analytics),
            marketing: Some(self.marketing),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<ConsentManager> {
        Arc::new(ConsentManager::in_memory())
    }

    #[test]
    fn test_pending_then_visible_without_consent() {
        let mgr = manager();
        let banner = ConsentBanner::mount(mgr);
        assert_eq!(banner.state(), BannerState::Pending);
        assert_eq!(banner.reveal_delay(), Some(Duration::from_millis(1000)));
        assert_eq!(banner.reveal(), BannerState::Visible);
        assert!(banner.is_visible());
    }

    #[test]
    fn test_hidden_with_existing_consent() {
        let mgr = manager();
        mgr.reject_all();
        let banner = ConsentBanner::mount(mgr);
        assert_eq!(banner.state(), BannerState::Hidden);
        assert!(banner.reveal_delay().is_none());
        assert_eq!(banner.reveal(), BannerState::Hidden);
    }

    #[test]
    fn test_choice_during_delay_keeps_hidden() {
        let mgr = manager();
        let banner = ConsentBanner::mount(mgr.clone());
        mgr.accept_all();
        assert_eq!(banner.reveal(), BannerState::Hidden);
    }

    #[test]
    fn test_accept_hides_and_reset_shows_again() {
        let mgr = manager();
        let banner = ConsentBanner::mount(mgr.clone());
        banner.reveal();

        banner.accept_all();
        assert_eq!(banner.state(), BannerState::Hidden);

        mgr.reset_consent();
        assert_eq!(banner.state(), BannerState::Visible);

        banner.reject_all();
        assert_eq!(banner.state(), BannerState::Hidden);
    }

    #[test]
    fn test_unpersisted_choice_keeps_banner_up() {
        use crate::events::ConsentEvents;
        use crate::storage::ConsentStorage;
        use bulwark_core::{ConsentConfig, Error, Result};
        use chrono::{DateTime, Utc};

        struct FullStorage;

        impl ConsentStorage for FullStorage {
            fn read(&self, _key: &str) -> Result<Option<String>> {
                Ok(None)
            }
            fn write(&self, _key: &str, _value: &str, _expires_at: DateTime<Utc>) -> Result<()> {
                Err(Error::Storage("quota exceeded".into()))
            }
            fn delete(&self, _key: &str) -> Result<()> {
                Ok(())
            }
        }

        let mgr = Arc::new(ConsentManager::new(
            Arc::new(FullStorage),
            ConsentEvents::new(),
            ConsentConfig::default(),
        ));
        let banner = ConsentBanner::mount(mgr.clone());
        banner.reveal();

        banner.accept_all();
        assert!(banner.is_visible());
        assert!(!mgr.has_any_consent());
        assert!(!banner.manage_preferences().is_enabled(ConsentCategory::Analytics));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let mgr = manager();
        let banner = ConsentBanner::mount(mgr.clone());
        assert_eq!(mgr.events().listener_count(), 1);
        drop(banner);
        assert_eq!(mgr.events().listener_count(), 0);
    }

    #[test]
    fn test_preference_center_seeded_from_record() {
        let mgr = manager();
        let banner = ConsentBanner::mount(mgr.clone());

        let prefs = banner.manage_preferences();
        assert!(!prefs.is_enabled(ConsentCategory::Analytics));
        assert!(!prefs.is_enabled(ConsentCategory::Marketing));
        assert!(prefs.is_enabled(ConsentCategory::Essential));

        mgr.save_consent_preferences(ConsentUpdate {
            analytics: Some(true),
            marketing: None,
        });
        let prefs = banner.manage_preferences();
        assert!(prefs.is_enabled(ConsentCategory::Analytics));
        assert!(!prefs.is_enabled(ConsentCategory::Marketing));
    }

    #[test]
    fn test_preference_center_commits_only_on_save() {
        let mgr = manager();
        let banner = ConsentBanner::mount(mgr.clone());
        banner.reveal();

        let mut prefs = banner.manage_preferences();
        assert!(prefs.toggle(ConsentCategory::Marketing));
        assert!(!prefs.set(ConsentCategory::Essential, false));
        assert!(prefs.is_enabled(ConsentCategory::Essential));
        assert!(!mgr.has_any_consent());
        assert!(banner.is_visible());

        let record = prefs.save();
        assert!(!record.analytics);
        assert!(record.marketing);
        assert!(mgr.has_consent(ConsentCategory::Marketing));
        assert_eq!(banner.state(), BannerState::Hidden);
    }
}
