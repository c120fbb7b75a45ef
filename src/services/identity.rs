//! Persistence of the current checkout identifier, one per sales channel.
//!
//! Cookie handling is deliberately behind a trait so the orchestrator and
//! handlers never touch ambient cookie state directly, and tests can
//! substitute [`InMemoryIdentityStore`].

use std::collections::HashMap;
use std::sync::Mutex;

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::models::CheckoutId;

/// Primary cookie name prefix; the channel slug is appended.
pub const CHECKOUT_COOKIE_PREFIX: &str = "checkoutId-";

/// Older naming schemes still found in the wild. Any one of them left behind
/// after cleanup can resurrect a stale checkout, so all of them are expired.
pub const LEGACY_COOKIE_PREFIXES: &[&str] = &["checkout-", "cart-"];
pub const LEGACY_COOKIE_NAMES: &[&str] = &["checkoutId", "cartId", "checkoutToken"];

/// Channel-scoped persistence of the checkout identifier.
///
/// Every operation is side-effect-only and infallible: with cookies disabled
/// the store degrades to "no persisted checkout" rather than failing a
/// request.
pub trait CheckoutIdentityStore: Send + Sync {
    fn get(&self, channel: &str) -> Option<CheckoutId>;
    fn save(&self, channel: &str, id: &CheckoutId);
    fn clear(&self, channel: &str);
    fn clear_all(&self);
}

fn cookie_name(channel: &str) -> String {
    format!("{}{}", CHECKOUT_COOKIE_PREFIX, channel)
}

fn is_checkout_cookie(name: &str) -> bool {
    name.starts_with(CHECKOUT_COOKIE_PREFIX)
        || LEGACY_COOKIE_PREFIXES.iter().any(|p| name.starts_with(p))
        || LEGACY_COOKIE_NAMES.contains(&name)
}

/// Cookie-backed store for one request/response cycle.
///
/// Reads come from the request `Cookie` header, parsed once at construction.
/// Writes accumulate as `Set-Cookie` values which the handler applies to the
/// response. Clearing removes the value from the in-request view *and* emits
/// an expiration, covering both deletion paths.
pub struct CookieIdentityStore {
    incoming: Mutex<HashMap<String, String>>,
    pending: Mutex<Vec<String>>,
    max_age: chrono::Duration,
}

impl CookieIdentityStore {
    pub fn from_headers(headers: &HeaderMap, max_age: chrono::Duration) -> Self {
        let mut incoming = HashMap::new();
        for value in headers.get_all(COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    incoming.insert(name.to_string(), value.to_string());
                }
            }
        }
        Self {
            incoming: Mutex::new(incoming),
            pending: Mutex::new(Vec::new()),
            max_age,
        }
    }

    fn push_expiration(&self, name: &str) {
        self.pending
            .lock()
            .expect("cookie jar lock poisoned")
            .push(format!("{}=; Path=/; Max-Age=0; SameSite=Lax", name));
    }

    /// Applies the accumulated `Set-Cookie` values to a response header map.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        let pending = self.pending.lock().expect("cookie jar lock poisoned");
        for cookie in pending.iter() {
            if let Ok(value) = HeaderValue::from_str(cookie) {
                headers.append(SET_COOKIE, value);
            }
        }
    }
}

impl CheckoutIdentityStore for CookieIdentityStore {
    fn get(&self, channel: &str) -> Option<CheckoutId> {
        let incoming = self.incoming.lock().expect("cookie jar lock poisoned");
        incoming
            .get(&cookie_name(channel))
            .or_else(|| {
                // Fall back to legacy names so checkouts started before a
                // cookie-scheme change are still honored.
                LEGACY_COOKIE_PREFIXES
                    .iter()
                    .find_map(|p| incoming.get(&format!("{}{}", p, channel)))
            })
            .filter(|v| !v.is_empty())
            .map(|v| CheckoutId::new(v.clone()))
    }

    fn save(&self, channel: &str, id: &CheckoutId) {
        let name = cookie_name(channel);
        self.incoming
            .lock()
            .expect("cookie jar lock poisoned")
            .insert(name.clone(), id.as_str().to_string());
        self.pending
            .lock()
            .expect("cookie jar lock poisoned")
            .push(format!(
                "{}={}; Path=/; Max-Age={}; SameSite=Lax",
                name,
                id.as_str(),
                self.max_age.num_seconds()
            ));
    }

    fn clear(&self, channel: &str) {
        let mut incoming = self.incoming.lock().expect("cookie jar lock poisoned");
        let mut names = vec![cookie_name(channel)];
        for prefix in LEGACY_COOKIE_PREFIXES {
            names.push(format!("{}{}", prefix, channel));
        }
        for name in names {
            incoming.remove(&name);
            self.push_expiration(&name);
        }
    }

    fn clear_all(&self) {
        let names: Vec<String> = {
            let incoming = self.incoming.lock().expect("cookie jar lock poisoned");
            incoming
                .keys()
                .filter(|name| is_checkout_cookie(name))
                .cloned()
                .collect()
        };
        {
            let mut incoming = self.incoming.lock().expect("cookie jar lock poisoned");
            for name in &names {
                incoming.remove(name);
            }
        }
        for name in &names {
            self.push_expiration(name);
        }
        // Legacy names are expired even when absent from the request: a
        // cookie set as HttpOnly elsewhere is invisible here but still real.
        for name in LEGACY_COOKIE_NAMES {
            self.push_expiration(name);
        }
        debug!("checkout cookies cleared");
    }
}

/// In-memory fake used by tests and by flows with no HTTP context.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    entries: Mutex<HashMap<String, CheckoutId>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckoutIdentityStore for InMemoryIdentityStore {
    fn get(&self, channel: &str) -> Option<CheckoutId> {
        self.entries
            .lock()
            .expect("identity lock poisoned")
            .get(channel)
            .cloned()
    }

    fn save(&self, channel: &str, id: &CheckoutId) {
        self.entries
            .lock()
            .expect("identity lock poisoned")
            .insert(channel.to_string(), id.clone());
    }

    fn clear(&self, channel: &str) {
        self.entries
            .lock()
            .expect("identity lock poisoned")
            .remove(channel);
    }

    fn clear_all(&self) {
        self.entries
            .lock()
            .expect("identity lock poisoned")
            .clear();
    }
}
