//! Clears checkout/cart identity once an order is confirmed.
//!
//! Invoked only as a side effect of reaching the completed state, never
//! speculatively, since premature clearing would orphan an in-progress
//! checkout. Safe to call more than once.

use tracing::debug;

use crate::events::{Event, EventSender};
use crate::services::identity::CheckoutIdentityStore;

#[derive(Clone)]
pub struct SessionCleanup {
    events: EventSender,
}

impl SessionCleanup {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    /// Removes every known checkout cookie and storage key, current and
    /// legacy naming schemes alike, on both deletion paths.
    pub async fn clear_all(&self, identity: &dyn CheckoutIdentityStore) {
        identity.clear_all();
        debug!("checkout session cleared");
        self.events.send(Event::SessionCleared { channel: None }).await;
    }

    /// Clears a single channel's identity (explicit cart-clear action).
    pub async fn clear_channel(&self, identity: &dyn CheckoutIdentityStore, channel: &str) {
        identity.clear(channel);
        self.events
            .send(Event::SessionCleared {
                channel: Some(channel.to_string()),
            })
            .await;
    }
}
