//! Drives the "complete checkout → obtain order" transition.
//!
//! Two entry points call the same completion mutation but interpret failure
//! differently. On the direct path a missing or errored checkout is a plain
//! failure. On the post-redirect recovery path the request is preceded by an
//! external payment redirect, so "checkout already gone" most likely means a
//! previous attempt (a double submit, or returning twice) already consumed
//! it. That case is reclassified as a soft success rather than shown as an
//! error for a payment that went through.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::counter;
use tracing::{info, instrument, warn};
use url::Url;

use crate::commerce::{CommerceApi, CompletionData};
use crate::events::{Event, EventSender};
use crate::models::{CheckoutId, OrderId};
use crate::services::cleanup::SessionCleanup;
use crate::services::identity::CheckoutIdentityStore;
use crate::services::url_state::{self, UrlState};

/// Observable state of one checkout's completion attempt.
/// `RedirectedToGateway` is implicit; control has left the application
/// entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Idle,
    Submitting,
    PostRedirectRecovering,
    Completed,
    Failed,
}

impl CompletionState {
    fn in_flight(self) -> bool {
        matches!(
            self,
            CompletionState::Submitting | CompletionState::PostRedirectRecovering
        )
    }
}

/// Result of a completion attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The backend produced an order. `redirect` is the confirmation URL
    /// (order id set, checkout/payment parameters stripped); the caller
    /// performs a hard navigation to it.
    Completed { order_id: OrderId, redirect: Url },
    /// Recovery-path determination that payment already succeeded even
    /// though no order record is at hand.
    SoftSuccess,
    /// The attempt failed; the current page stays usable.
    Failed { message: String },
}

pub struct CompletionOrchestrator {
    api: Arc<dyn CommerceApi>,
    events: EventSender,
    cleanup: SessionCleanup,
    /// Attempt state keyed by checkout id. An in-flight entry doubles as the
    /// at-most-one guard for that checkout; unrelated checkouts complete
    /// independently.
    attempts: DashMap<CheckoutId, CompletionState>,
}

impl CompletionOrchestrator {
    pub fn new(api: Arc<dyn CommerceApi>, events: EventSender, cleanup: SessionCleanup) -> Self {
        Self {
            api,
            events,
            cleanup,
            attempts: DashMap::new(),
        }
    }

    /// State of the attempt for one checkout; `Idle` when none was made.
    pub fn state_of(&self, id: &CheckoutId) -> CompletionState {
        self.attempts
            .get(id)
            .map(|entry| *entry.value())
            .unwrap_or(CompletionState::Idle)
    }

    /// Direct submission path, triggered by the user's pay action.
    ///
    /// A missing checkout id fails immediately without a network call. While
    /// a completion for this checkout is in flight, further triggers issue
    /// zero network calls and report failure; the submit control is expected
    /// to be disabled, so this only catches rapid repeated clicks.
    #[instrument(skip(self, identity))]
    pub async fn submit(
        &self,
        checkout_id: Option<&CheckoutId>,
        return_to: &Url,
        identity: &dyn CheckoutIdentityStore,
    ) -> CompletionOutcome {
        let Some(id) = checkout_id else {
            return CompletionOutcome::Failed {
                message: "No active checkout to complete".to_string(),
            };
        };
        if !self.begin(id, CompletionState::Submitting) {
            return CompletionOutcome::Failed {
                message: "A completion attempt is already in progress".to_string(),
            };
        }
        let outcome = self.complete(id, return_to, identity, false).await;
        self.finish(id, &outcome);
        outcome
    }

    /// Post-redirect recovery path.
    ///
    /// Runs when a request arrives carrying a processing marker and no
    /// completion has been made for that checkout. The checkout id comes from
    /// the URL, not the cookie, since a prior attempt may already have
    /// cleared the cookie.
    #[instrument(skip(self, identity))]
    pub async fn recover(
        &self,
        url: &UrlState,
        return_to: &Url,
        identity: &dyn CheckoutIdentityStore,
    ) -> CompletionOutcome {
        let Some(id) = url.checkout.as_ref() else {
            return CompletionOutcome::Failed {
                message: "No checkout reference to recover".to_string(),
            };
        };
        if !self.begin(id, CompletionState::PostRedirectRecovering) {
            return CompletionOutcome::Failed {
                message: "A completion attempt is already in progress".to_string(),
            };
        }
        let outcome = self.complete(id, return_to, identity, true).await;
        self.finish(id, &outcome);
        outcome
    }

    async fn complete(
        &self,
        id: &CheckoutId,
        return_to: &Url,
        identity: &dyn CheckoutIdentityStore,
        recovering: bool,
    ) -> CompletionOutcome {
        match self.api.checkout_complete(id).await {
            Ok(CompletionData {
                order: Some(order),
                errors,
            }) if errors.is_empty() => {
                let redirect = url_state::confirmation_url(return_to, &order.id);
                // Cleanup happens here and only here: the checkout is
                // consumed, so any surviving identifier is stale.
                self.cleanup.clear_all(identity).await;
                self.events
                    .send(Event::CheckoutCompleted {
                        checkout_id: id.clone(),
                        order_id: order.id.clone(),
                    })
                    .await;
                counter!("checkout_completions_total", 1, "outcome" => "completed");
                info!(checkout_id = %id, order_id = %order.id, "checkout completed");
                CompletionOutcome::Completed {
                    order_id: order.id,
                    redirect,
                }
            }
            Ok(CompletionData { errors, .. }) => {
                let message = errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Checkout could not be completed".to_string());
                self.fail_or_soft(id, identity, recovering, message).await
            }
            Err(err) => {
                self.fail_or_soft(id, identity, recovering, err.to_string())
                    .await
            }
        }
    }

    async fn fail_or_soft(
        &self,
        id: &CheckoutId,
        identity: &dyn CheckoutIdentityStore,
        recovering: bool,
        message: String,
    ) -> CompletionOutcome {
        if recovering {
            // Reaching recovery implies the gateway already authorized
            // payment; the checkout being gone here almost always means an
            // earlier attempt completed it.
            info!(checkout_id = %id, %message, "completion failed after redirect, treating as soft success");
            self.cleanup.clear_all(identity).await;
            self.events
                .send(Event::CompletionRecovered {
                    checkout_id: id.clone(),
                })
                .await;
            counter!("checkout_completions_total", 1, "outcome" => "soft_success");
            CompletionOutcome::SoftSuccess
        } else {
            warn!(checkout_id = %id, %message, "checkout completion failed");
            self.events
                .send(Event::CompletionFailed {
                    checkout_id: id.clone(),
                    reason: message.clone(),
                })
                .await;
            counter!("checkout_completions_total", 1, "outcome" => "failed");
            CompletionOutcome::Failed { message }
        }
    }

    /// Takes the in-flight guard for one checkout. Returns false when a
    /// completion call for the same checkout is already running.
    fn begin(&self, id: &CheckoutId, state: CompletionState) -> bool {
        match self.attempts.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().in_flight() {
                    return false;
                }
                entry.insert(state);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(state);
                true
            }
        }
    }

    fn finish(&self, id: &CheckoutId, outcome: &CompletionOutcome) {
        let state = match outcome {
            CompletionOutcome::Completed { .. } | CompletionOutcome::SoftSuccess => {
                CompletionState::Completed
            }
            CompletionOutcome::Failed { .. } => CompletionState::Failed,
        };
        self.attempts.insert(id.clone(), state);
    }
}
