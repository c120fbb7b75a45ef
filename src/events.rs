use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::{CheckoutId, OrderId};

/// Events emitted by the checkout orchestration services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A checkout was established for a channel (first add-to-cart).
    CheckoutStarted {
        checkout_id: CheckoutId,
        channel: String,
    },
    /// Completion succeeded and an order was produced.
    CheckoutCompleted {
        checkout_id: CheckoutId,
        order_id: OrderId,
    },
    /// A direct completion attempt failed; the checkout remains usable.
    CompletionFailed {
        checkout_id: CheckoutId,
        reason: String,
    },
    /// A post-redirect recovery attempt found the checkout already consumed
    /// and was reclassified as a soft success.
    CompletionRecovered { checkout_id: CheckoutId },
    /// The polled order materialized.
    OrderConfirmed(OrderId),
    /// Checkout/cart identity was cleared. `None` means all channels.
    SessionCleared { channel: Option<String> },
}

/// Cloneable handle for publishing events onto the shared channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event. Delivery is best-effort: a closed or full channel is
    /// logged and swallowed so event plumbing can never fail a checkout.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            warn!("failed to send event: {}", err);
        }
    }
}

/// Drains the event channel, logging each event. Runs until every
/// `EventSender` has been dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "event processed");
    }
}
