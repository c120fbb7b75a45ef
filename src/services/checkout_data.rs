//! Fetches and revalidates the checkout entity, with a short-TTL cache and
//! stale-while-revalidate semantics.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{instrument, warn};

use crate::commerce::{CommerceApi, FetchPolicy};
use crate::errors::CheckoutError;
use crate::models::{Checkout, CheckoutId};

/// Result of a checkout read, with its load status.
///
/// `fetching` means a request for this id is in flight with no data yet;
/// `stale` means a cached value is being revalidated in the background. The
/// view router only cares about the combination ([`CheckoutFetch::is_loading`]).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckoutFetch {
    pub checkout: Option<Checkout>,
    pub fetching: bool,
    pub stale: bool,
}

impl CheckoutFetch {
    pub fn resolved(checkout: Option<Checkout>) -> Self {
        Self {
            checkout,
            fetching: false,
            stale: false,
        }
    }

    pub fn pending() -> Self {
        Self {
            checkout: None,
            fetching: true,
            stale: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.fetching || self.stale
    }
}

struct CacheEntry {
    checkout: Option<Checkout>,
    fetched_at: Instant,
}

/// Read side of the checkout entity.
#[derive(Clone)]
pub struct CheckoutDataClient {
    api: Arc<dyn CommerceApi>,
    cache: Arc<RwLock<HashMap<CheckoutId, CacheEntry>>>,
    ttl: Duration,
}

impl CheckoutDataClient {
    pub fn new(api: Arc<dyn CommerceApi>, ttl: Duration) -> Self {
        Self {
            api,
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Resolves the checkout. `Ok` with `checkout: None` when the id is
    /// unknown or expired server-side.
    ///
    /// With [`FetchPolicy::CacheFirst`], a fresh cache entry is returned
    /// directly and an expired one is returned marked `stale` while a
    /// background task revalidates it. [`FetchPolicy::NetworkOnly`] always
    /// goes to the backend; the completion and confirmation paths require it.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        id: &CheckoutId,
        locale: &str,
        policy: FetchPolicy,
    ) -> Result<CheckoutFetch, CheckoutError> {
        if policy == FetchPolicy::CacheFirst {
            let cached = {
                let cache = self.cache.read().expect("checkout cache lock poisoned");
                cache.get(id).map(|entry| {
                    (entry.checkout.clone(), entry.fetched_at.elapsed() < self.ttl)
                })
            };
            match cached {
                Some((checkout, true)) => return Ok(CheckoutFetch::resolved(checkout)),
                Some((checkout, false)) => {
                    self.spawn_revalidation(id.clone(), locale.to_string());
                    return Ok(CheckoutFetch {
                        checkout,
                        fetching: false,
                        stale: true,
                    });
                }
                None => {}
            }
        }

        let checkout = self.api.checkout_by_id(id, locale, policy).await?;
        self.store(id.clone(), checkout.clone());
        Ok(CheckoutFetch::resolved(checkout))
    }

    /// Drops the cached entry so the next read goes to the backend. Called
    /// after every line mutation.
    pub fn invalidate(&self, id: &CheckoutId) {
        self.cache
            .write()
            .expect("checkout cache lock poisoned")
            .remove(id);
    }

    fn store(&self, id: CheckoutId, checkout: Option<Checkout>) {
        self.cache
            .write()
            .expect("checkout cache lock poisoned")
            .insert(
                id,
                CacheEntry {
                    checkout,
                    fetched_at: Instant::now(),
                },
            );
    }

    fn spawn_revalidation(&self, id: CheckoutId, locale: String) {
        let client = self.clone();
        tokio::spawn(async move {
            match client
                .api
                .checkout_by_id(&id, &locale, FetchPolicy::NetworkOnly)
                .await
            {
                Ok(checkout) => client.store(id, checkout),
                Err(err) => warn!(checkout_id = %id, error = %err, "checkout revalidation failed"),
            }
        });
    }
}
