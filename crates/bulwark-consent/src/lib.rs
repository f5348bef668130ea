//! Consent management — the visitor's privacy choices and everything that
//! reacts to them.
//!
//! The [`ConsentManager`] owns a single versioned [`ConsentRecord`] kept in a
//! pluggable [`ConsentStorage`] (memory, JSON file, or an HTTP cookie jar) and
//! fans every change out through [`ConsentEvents`]. The banner, the
//! preference center and the analytics gate are consumers built on top.

pub mod analytics;
pub mod banner;
pub mod cookie;
pub mod events;
pub mod manager;
pub mod record;
pub mod storage;

pub use analytics::AnalyticsGate;
pub use banner::{BannerState, ConsentBanner, PreferenceCenter};
pub use cookie::CookieJar;
pub use events::{ConsentEvents, SubscriptionId, CONSENT_UPDATED};
pub use manager::ConsentManager;
pub use record::{ConsentCategory, ConsentRecord, ConsentUpdate};
pub use storage::{ConsentStorage, FileStorage, MemoryStorage};
