//! Request-scoped cookie jar implementing [`ConsentStorage`].
//!
//! Built from the `Cookie` header of an incoming request. Writes and deletes
//! update the jar's view immediately and queue `Set-Cookie` values for the
//! response.

use std::collections::HashMap;

use bulwark_core::{is_valid_cookie_name, Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::storage::ConsentStorage;

const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Default)]
struct JarInner {
    values: HashMap<String, String>,
    pending: Vec<String>,
}

/// Cookies sent with one request, plus the `Set-Cookie` values to answer with.
#[derive(Default)]
pub struct CookieJar {
    inner: Mutex<JarInner>,
    secure: bool,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every `Cookie` header value of a request. The first occurrence
    /// of a name wins.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut values = HashMap::new();
        for header in headers {
            for pair in header.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim().trim_matches('"');
                let decoded = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                values.entry(name.to_string()).or_insert(decoded);
            }
        }

        Self {
            inner: Mutex::new(JarInner {
                values,
                pending: Vec::new(),
            }),
            secure: false,
        }
    }

    /// Mark emitted cookies `Secure` (HTTPS deployments).
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Current value of a cookie, reflecting writes made through this jar.
    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.lock().values.get(name).cloned()
    }

    /// Drain the queued `Set-Cookie` header values.
    pub fn take_set_cookies(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().pending)
    }

    fn check_name(key: &str) -> Result<()> {
        if !is_valid_cookie_name(key) {
            return Err(Error::Validation(format!("{:?} is not a valid cookie name", key)));
        }
        Ok(())
    }

    fn attributes(&self) -> &'static str {
        if self.secure {
            "Path=/; SameSite=Lax; Secure"
        } else {
            "Path=/; SameSite=Lax"
        }
    }
}

impl ConsentStorage for CookieJar {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        Self::check_name(key)?;
        let max_age = (expires_at - Utc::now()).num_seconds().max(0);
        let header = format!(
            "{}={}; Expires={}; Max-Age={}; {}",
            key,
            urlencoding::encode(value),
            expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
            max_age,
            self.attributes()
        );

        let mut inner = self.inner.lock();
        if max_age > 0 {
            inner.values.insert(key.to_string(), value.to_string());
        } else {
            inner.values.remove(key);
        }
        inner.pending.push(header);
        debug!("Queued cookie {} (max-age {}s)", key, max_age);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        Self::check_name(key)?;
        let header = format!(
            "{}=; Expires={}; Max-Age=0; {}",
            key,
            EPOCH_HTTP_DATE,
            self.attributes()
        );

        let mut inner = self.inner.lock();
        inner.values.remove(key);
        inner.pending.push(header);
        Ok(())
    }
}
